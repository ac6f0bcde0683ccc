//! # Weighted aggregator
//! Trainable combiner that fuses the per-layer scores into one final score.
//!
//! `p = sigmoid(dot(softmax(w), scores) + b)`
//!
//! Raw weights are stored as-is and softmax-normalised at use time, so the
//! effective weights always sum to 1 whatever the raw magnitudes are.
//! Training is plain online gradient descent on binary cross-entropy. The
//! weight gradient is `(p - t) * p * (1 - p) * score_i`, i.e. it skips the
//! softmax Jacobian; models trained elsewhere with that rule load and behave
//! identically here.

use std::{collections::BTreeMap, fs, path::Path};

use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::layers::LAYER_NAMES;

pub const DEFAULT_LEARNING_RATE: f64 = 0.01;
const BCE_EPS: f64 = 1e-7;
const SIGMOID_CLIP: f64 = 20.0;
/// Smallest weight accepted by `from_fixed_weights` before taking the log.
const MIN_FIXED_WEIGHT: f64 = 1e-9;

/// Persisted combiner state: raw weights, bias and layer count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightModel {
    pub weights: Vec<f64>,
    pub bias: f64,
    pub n_layers: usize,
}

impl WeightModel {
    /// Untrained state: every raw weight `1/n`, no bias.
    pub fn uniform(n_layers: usize) -> Self {
        let w = if n_layers == 0 { 0.0 } else { 1.0 / n_layers as f64 };
        Self {
            weights: vec![w; n_layers],
            bias: 0.0,
            n_layers,
        }
    }

    /// Model whose softmax reproduces the given fixed weights.
    ///
    /// `ln(w)` is softmax's inverse up to a constant, so `[0.4, 0.4, 0.2]`
    /// gives back exactly those effective weights. Zero or negative weights
    /// are floored to a tiny positive value.
    pub fn from_fixed_weights(fixed: &[f64]) -> Result<Self, ModelError> {
        if fixed.is_empty() {
            return Err(ModelError::Empty);
        }
        let weights = fixed.iter().map(|w| w.max(MIN_FIXED_WEIGHT).ln()).collect();
        Ok(Self {
            weights,
            bias: 0.0,
            n_layers: fixed.len(),
        })
    }

    pub fn normalized_weights(&self) -> Vec<f64> {
        softmax(&self.weights)
    }

    /// Normalised weights keyed by layer name.
    pub fn get_weights(&self) -> BTreeMap<String, f64> {
        self.normalized_weights()
            .into_iter()
            .enumerate()
            .map(|(i, w)| {
                let name = LAYER_NAMES
                    .get(i)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("layer{i}"));
                (name, w)
            })
            .collect()
    }

    fn check_consistent(&self) -> Result<(), ModelError> {
        if self.n_layers == 0 {
            return Err(ModelError::Empty);
        }
        if self.weights.len() != self.n_layers {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_layers,
                actual: self.weights.len(),
            });
        }
        Ok(())
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a model and insist it fuses exactly `expected_layers` layers.
    pub fn load<P: AsRef<Path>>(path: P, expected_layers: usize) -> Result<Self, ModelError> {
        let content = fs::read_to_string(path)?;
        let model: WeightModel = serde_json::from_str(&content)?;
        model.check_consistent()?;
        if model.n_layers != expected_layers {
            return Err(ModelError::DimensionMismatch {
                expected: expected_layers,
                actual: model.n_layers,
            });
        }
        Ok(model)
    }
}

/// One labelled example: layer scores in combiner order and a 0/1 target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub scores: Vec<f64>,
    pub target: f64,
}

impl TrainingSample {
    pub fn new(scores: Vec<f64>, target: f64) -> Self {
        Self { scores, target }
    }
}

#[derive(Debug, Clone)]
pub struct WeightedAggregator {
    model: WeightModel,
    learning_rate: f64,
    history: Vec<f64>,
}

impl WeightedAggregator {
    pub fn new(model: WeightModel, learning_rate: f64) -> Self {
        Self {
            model,
            learning_rate,
            history: Vec::new(),
        }
    }

    pub fn uniform(n_layers: usize) -> Self {
        Self::new(WeightModel::uniform(n_layers), DEFAULT_LEARNING_RATE)
    }

    pub fn model(&self) -> &WeightModel {
        &self.model
    }

    pub fn n_layers(&self) -> usize {
        self.model.n_layers
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Mean loss per epoch from the last `train` call.
    pub fn loss_history(&self) -> &[f64] {
        &self.history
    }

    pub fn normalized_weights(&self) -> Vec<f64> {
        self.model.normalized_weights()
    }

    fn check_input(&self, scores: &[f64]) -> Result<(), ModelError> {
        self.model.check_consistent()?;
        if scores.len() != self.model.n_layers {
            return Err(ModelError::DimensionMismatch {
                expected: self.model.n_layers,
                actual: scores.len(),
            });
        }
        Ok(())
    }

    pub fn forward(&self, scores: &[f64]) -> Result<f64, ModelError> {
        self.check_input(scores)?;
        Ok(self.forward_unchecked(scores))
    }

    fn forward_unchecked(&self, scores: &[f64]) -> f64 {
        let w = softmax(&self.model.weights);
        let z: f64 = w.iter().zip(scores).map(|(w, s)| w * s).sum::<f64>() + self.model.bias;
        sigmoid(z)
    }

    /// One gradient step; returns the loss before the update.
    pub fn train_step(&mut self, scores: &[f64], target: f64) -> Result<f64, ModelError> {
        self.check_input(scores)?;
        if target != 0.0 && target != 1.0 {
            return Err(ModelError::InvalidTarget(target));
        }

        let p = self.forward_unchecked(scores);
        let loss = -(target * (p + BCE_EPS).ln() + (1.0 - target) * (1.0 - p + BCE_EPS).ln());

        let delta = (p - target) * p * (1.0 - p);
        for (w, s) in self.model.weights.iter_mut().zip(scores) {
            *w -= self.learning_rate * delta * s;
        }
        self.model.bias -= self.learning_rate * delta;

        Ok(loss)
    }

    /// Fixed number of in-order passes over `dataset`. Returns the mean loss
    /// of each epoch, which is also kept as the loss history.
    pub fn train(&mut self, dataset: &[TrainingSample], epochs: usize) -> Result<Vec<f64>, ModelError> {
        if dataset.is_empty() {
            return Err(ModelError::EmptyDataset);
        }
        // Validate everything up front so a bad row can't leave a half-trained model.
        for s in dataset {
            self.check_input(&s.scores)?;
            if s.target != 0.0 && s.target != 1.0 {
                return Err(ModelError::InvalidTarget(s.target));
            }
        }

        let mut losses = Vec::with_capacity(epochs);
        for epoch in 0..epochs {
            let mut total = 0.0;
            for s in dataset {
                total += self.train_step(&s.scores, s.target)?;
            }
            let avg = total / dataset.len() as f64;
            losses.push(avg);
            counter!("aggregator_train_epochs_total").increment(1);
            if epoch % 20 == 0 {
                tracing::debug!(epoch, loss = avg, "aggregator training");
            }
        }

        tracing::info!(
            epochs,
            samples = dataset.len(),
            final_loss = losses.last().copied().unwrap_or(f64::NAN),
            weights = ?self.model.normalized_weights(),
            "aggregator trained"
        );
        self.history = losses.clone();
        Ok(losses)
    }
}

/// Numerically stable softmax; an all-equal input (including all zeros)
/// gives uniform weights.
pub fn softmax(x: &[f64]) -> Vec<f64> {
    if x.is_empty() {
        return Vec::new();
    }
    let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = x.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x.clamp(-SIGMOID_CLIP, SIGMOID_CLIP)).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one() {
        for raw in [
            vec![0.0, 0.0, 0.0, 0.0],
            vec![0.25; 4],
            vec![-3.0, 7.5, 0.1, 100.0],
            vec![1e3, -1e3, 0.0, 5.0],
        ] {
            let s: f64 = softmax(&raw).iter().sum();
            assert!((s - 1.0).abs() < 1e-9, "{raw:?} -> {s}");
        }
        assert_eq!(softmax(&[0.0; 4]), vec![0.25; 4]);
    }

    #[test]
    fn sigmoid_is_clipped() {
        assert_eq!(sigmoid(1e6), sigmoid(20.0));
        assert!(sigmoid(-1e6) > 0.0);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn uniform_forward_matches_hand_calculation() {
        let agg = WeightedAggregator::uniform(4);
        let p = agg.forward(&[0.8, 0.6, 0.5, 0.1]).unwrap();
        // mean 0.5 -> sigmoid(0.5)
        assert!((p - 0.622_459_331).abs() < 1e-6);
    }

    #[test]
    fn forward_rejects_wrong_arity() {
        let agg = WeightedAggregator::uniform(4);
        assert!(matches!(
            agg.forward(&[0.1, 0.2, 0.3]),
            Err(ModelError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        ));
        let empty = WeightedAggregator::uniform(0);
        assert!(matches!(empty.forward(&[]), Err(ModelError::Empty)));
    }

    #[test]
    fn fixed_weights_survive_softmax() {
        let m = WeightModel::from_fixed_weights(&[0.4, 0.4, 0.2]).unwrap();
        let w = m.normalized_weights();
        assert!((w[0] - 0.4).abs() < 1e-12);
        assert!((w[2] - 0.2).abs() < 1e-12);
        assert_eq!(m.get_weights().len(), 3);
        assert!(m.get_weights().contains_key("reputation"));
    }

    #[test]
    fn train_step_moves_towards_target() {
        let mut agg = WeightedAggregator::new(WeightModel::uniform(4), 0.5);
        let x = [0.9, 0.9, 0.9, 0.9];
        let before = agg.forward(&x).unwrap();
        agg.train_step(&x, 1.0).unwrap();
        assert!(agg.forward(&x).unwrap() > before);
        assert!(agg.model().bias > 0.0);

        let mut agg = WeightedAggregator::new(WeightModel::uniform(4), 0.5);
        let before = agg.forward(&x).unwrap();
        agg.train_step(&x, 0.0).unwrap();
        assert!(agg.forward(&x).unwrap() < before);
    }

    #[test]
    fn gradient_uses_raw_scores() {
        let mut agg = WeightedAggregator::new(WeightModel::uniform(2), 1.0);
        let p = agg.forward(&[1.0, 0.0]).unwrap();
        agg.train_step(&[1.0, 0.0], 1.0).unwrap();
        let delta = (p - 1.0) * p * (1.0 - p);
        assert!((agg.model().weights[0] - (0.5 - delta)).abs() < 1e-12);
        // zero score means zero gradient for that weight
        assert_eq!(agg.model().weights[1], 0.5);
    }

    #[test]
    fn train_rejects_bad_rows_before_touching_the_model() {
        let mut agg = WeightedAggregator::uniform(2);
        let data = vec![
            TrainingSample::new(vec![0.5, 0.5], 1.0),
            TrainingSample::new(vec![0.5, 0.5], 0.3),
        ];
        assert!(matches!(agg.train(&data, 3), Err(ModelError::InvalidTarget(_))));
        assert_eq!(agg.model(), &WeightModel::uniform(2));
        assert!(matches!(agg.train(&[], 3), Err(ModelError::EmptyDataset)));
    }

    #[test]
    fn loss_is_finite_at_saturation() {
        let mut agg = WeightedAggregator::new(
            WeightModel {
                weights: vec![0.0, 0.0],
                bias: 50.0,
                n_layers: 2,
            },
            0.01,
        );
        let loss = agg.train_step(&[1.0, 1.0], 0.0).unwrap();
        assert!(loss.is_finite());
        assert!(loss > 10.0);
    }
}
