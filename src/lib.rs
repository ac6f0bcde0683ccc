// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod aggregator;
pub mod api;
pub mod config;
pub mod decision;
pub mod error;
pub mod evaluation;
pub mod history;
pub mod layers;
pub mod metrics;
pub mod orchestrator;
pub mod providers;
pub mod report;
pub mod rolling;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::aggregator::{TrainingSample, WeightModel, WeightedAggregator};
pub use crate::api::router;
pub use crate::config::ValidatorConfig;
pub use crate::decision::{DefaultedSignal, Signal, Status, ValidationResult};
pub use crate::error::{ModelError, ValidationError};
pub use crate::orchestrator::{
    Collaborators, ScoringContext, ValidationContext, ValidationOrchestrator,
};
pub use crate::report::{ContextReport, FeatureSet, Report, TrustProfile};
