//! Per-signal scorers. Every scorer is a total function over well-formed
//! inputs and returns scores in [0, 1].

pub mod consensus;
pub mod corroboration;
pub mod physical;
pub mod reputation;
pub mod statistical;
pub mod visual;

use serde::{Deserialize, Serialize};

pub use consensus::{ClusterSummary, ConsensusOutcome, SpatialConsensusAnalyzer};
pub use corroboration::{CorroborationScore, ExternalCorroborationScorer};
pub use physical::{PhysicalPlausibilityScorer, PhysicalScore};
pub use reputation::{InMemoryTrustStore, ReputationScore, ReputationScorer, TrustStore};
pub use statistical::{StatisticalConsistencyScorer, StatisticalScore};
pub use visual::{VisualEvidenceScorer, VisualScore};

/// Number of layers fused by the combiner.
pub const FUSED_LAYERS: usize = 4;

/// Layer names in combiner order.
pub const LAYER_NAMES: [&str; FUSED_LAYERS] =
    ["physical", "statistical", "reputation", "corroboration"];

/// Fixed-arity combiner input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerScores {
    pub physical: f64,
    pub statistical: f64,
    pub reputation: f64,
    pub corroboration: f64,
}

impl LayerScores {
    pub fn as_array(&self) -> [f64; FUSED_LAYERS] {
        [
            self.physical,
            self.statistical,
            self.reputation,
            self.corroboration,
        ]
    }
}
