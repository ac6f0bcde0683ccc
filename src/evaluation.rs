//! Offline evaluation of a combiner against labelled layer scores.

use serde::{Deserialize, Serialize};

use crate::aggregator::{TrainingSample, WeightedAggregator};
use crate::error::ModelError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn record(&mut self, predicted: bool, actual: bool) {
        match (predicted, actual) {
            (true, true) => self.true_positive += 1,
            (true, false) => self.false_positive += 1,
            (false, false) => self.true_negative += 1,
            (false, true) => self.false_negative += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    pub fn metrics(&self) -> ClassificationMetrics {
        let tp = self.true_positive as f64;
        let fp = self.false_positive as f64;
        let tn = self.true_negative as f64;
        let fn_ = self.false_negative as f64;

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = ratio(2.0 * precision * recall, precision + recall);
        ClassificationMetrics {
            accuracy: ratio(tp + tn, self.total() as f64),
            precision,
            recall,
            f1,
            specificity: ratio(tn, tn + fp),
        }
    }
}

/// Undefined ratios (zero denominator) are reported as 0.
fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub specificity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub threshold: f64,
    pub confusion: ConfusionMatrix,
    pub metrics: ClassificationMetrics,
}

/// Score every sample and compare `score >= threshold` with its target.
pub fn evaluate(
    aggregator: &WeightedAggregator,
    dataset: &[TrainingSample],
    threshold: f64,
) -> Result<EvaluationReport, ModelError> {
    if dataset.is_empty() {
        return Err(ModelError::EmptyDataset);
    }
    let mut confusion = ConfusionMatrix::default();
    for s in dataset {
        let p = aggregator.forward(&s.scores)?;
        confusion.record(p >= threshold, s.target >= 0.5);
    }
    Ok(EvaluationReport {
        threshold,
        confusion,
        metrics: confusion.metrics(),
    })
}
