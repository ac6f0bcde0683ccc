//! Error types surfaced by the validation core.
//!
//! Only two places can fail: the orchestrator boundary (bad input, broken
//! model) and weight-model loading. Missing collaborator
//! signals never show up here; they are recorded as defaulted signals on the
//! result instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("layer count mismatch: model expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("weight model has no layers")]
    Empty,

    #[error("training dataset is empty")]
    EmptyDataset,

    #[error("training target must be 0 or 1, got {0}")]
    InvalidTarget(f64),

    #[error("weight model io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("weight model format error: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid {field}: {value} ({reason})")]
    InvalidInput {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

impl ValidationError {
    pub(crate) fn invalid(field: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidInput {
            field,
            value,
            reason,
        }
    }
}
