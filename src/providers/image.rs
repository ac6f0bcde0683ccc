//! Photo evidence: a size gate and scoring wrapper around a pluggable
//! flood/not-flood image model.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ImageEvidence, ImageEvidenceClassifier};

/// Payloads smaller than this are not real photos.
pub const MIN_IMAGE_BYTES: usize = 1_000;
/// Payloads larger than this are refused outright.
pub const MAX_IMAGE_BYTES: usize = 10_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePrediction {
    pub is_flood: bool,
    pub confidence: f64,
    /// Fraction of pixels that look like water, in [0, 1].
    pub water_ratio: f64,
    pub model: String,
}

/// The classifier itself (CNN, remote service, ...).
#[async_trait]
pub trait FloodImageModel: Send + Sync {
    async fn predict(&self, image: &[u8]) -> Result<ImagePrediction>;
}

/// Stand-in used when no model is deployed: never detects a flood.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockFloodModel;

#[async_trait]
impl FloodImageModel for MockFloodModel {
    async fn predict(&self, _image: &[u8]) -> Result<ImagePrediction> {
        Ok(ImagePrediction {
            is_flood: false,
            confidence: 0.5,
            water_ratio: 0.0,
            model: "mock".to_string(),
        })
    }
}

pub struct GatedImageClassifier<M> {
    model: M,
}

impl<M: FloodImageModel> GatedImageClassifier<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

fn rejected(reason: &str) -> ImageEvidence {
    ImageEvidence {
        valid: false,
        is_flood_detected: false,
        confidence: 0.0,
        water_coverage: 0.0,
        score: 0.0,
        reason: Some(reason.to_string()),
    }
}

#[async_trait]
impl<M: FloodImageModel> ImageEvidenceClassifier for GatedImageClassifier<M> {
    async fn validate(&self, image: &[u8]) -> Result<ImageEvidence> {
        if image.len() < MIN_IMAGE_BYTES {
            return Ok(rejected("image too small"));
        }
        if image.len() > MAX_IMAGE_BYTES {
            return Ok(rejected("image too large"));
        }

        let p = self.model.predict(image).await?;

        let mut score = 0.5;
        if p.is_flood {
            score += 0.3;
        }
        if p.water_ratio > 0.2 {
            score += 0.2;
        }

        Ok(ImageEvidence {
            valid: true,
            is_flood_detected: p.is_flood,
            confidence: p.confidence,
            water_coverage: p.water_ratio,
            score: f64::min(score, 1.0),
            reason: None,
        })
    }

    fn name(&self) -> &'static str {
        "gated-image"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingModel {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FloodImageModel for CountingModel {
        async fn predict(&self, _image: &[u8]) -> Result<ImagePrediction> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ImagePrediction {
                is_flood: true,
                confidence: 0.93,
                water_ratio: 0.4,
                model: "counting".into(),
            })
        }
    }

    #[tokio::test]
    async fn size_gate_runs_before_model() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = GatedImageClassifier::new(CountingModel {
            calls: calls.clone(),
        });

        let small = c.validate(&[0u8; 999]).await.unwrap();
        assert!(!small.valid);
        assert_eq!(small.reason.as_deref(), Some("image too small"));

        let large = c.validate(&vec![0u8; MAX_IMAGE_BYTES + 1]).await.unwrap();
        assert!(!large.valid);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let ok = c.validate(&[0u8; MIN_IMAGE_BYTES]).await.unwrap();
        assert!(ok.valid);
        assert_eq!(ok.score, 1.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mock_model_is_neutral() {
        let c = GatedImageClassifier::new(MockFloodModel);
        let ev = c.validate(&[1u8; 4096]).await.unwrap();
        assert!(ev.valid);
        assert!(!ev.is_flood_detected);
        assert_eq!(ev.score, 0.5);
    }
}
