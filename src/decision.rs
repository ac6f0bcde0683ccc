//! # Decision
//! The outcome of one validation: status, final score, the full per-layer
//! breakdown and a short list of human-readable reasons.
//!
//! A `ValidationResult` is produced once per report and never mutated after
//! it is returned.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::layers::{
    ClusterSummary, ConsensusOutcome, CorroborationScore, LayerScores, PhysicalScore,
    ReputationScore, StatisticalScore, VisualScore,
};
use crate::providers::ZoneCheck;
use crate::report::{FeatureSet, ReportId, TrustProfile};

/// Scores at or above this are validated.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Validated,
    Flagged,
}

impl Status {
    /// Inclusive threshold: a score equal to `threshold` validates.
    pub fn decide(score: f64, threshold: f64) -> Self {
        if score >= threshold {
            Status::Validated
        } else {
            Status::Flagged
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Validated => "validated",
            Status::Flagged => "flagged",
        }
    }
}

/// External signals that can be replaced by a neutral default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Terrain,
    Weather,
    Zone,
    Corroboration,
    Image,
    Trust,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Terrain => "terrain",
            Signal::Weather => "weather",
            Signal::Zone => "zone",
            Signal::Corroboration => "corroboration",
            Signal::Image => "image",
            Signal::Trust => "trust",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultCause {
    Timeout,
    Error,
    /// Provider answered but had nothing for this location.
    NoData,
}

/// A signal that was unavailable and replaced by its neutral default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultedSignal {
    pub signal: Signal,
    pub cause: DefaultCause,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DefaultedSignal {
    pub fn new(signal: Signal, cause: DefaultCause) -> Self {
        Self {
            signal,
            cause,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Explainability line shown alongside the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reason {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ReasonKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonKind {
    Terrain,
    Consensus,
    Reputation,
    Corroboration,
    Visual,
    GroundTruth,
    Threshold,
    Default,
}

impl Reason {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
        }
    }

    pub fn kind(mut self, kind: ReasonKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// Published statistical layer: clustering blended with the rule checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalBreakdown {
    pub score: f64,
    pub cluster: ConsensusOutcome,
    pub rules: StatisticalScore,
    pub clusters: ClusterSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerBreakdown {
    pub physical: PhysicalScore,
    pub statistical: StatisticalBreakdown,
    pub reputation: ReputationScore,
    pub corroboration: CorroborationScore,
    pub visual: VisualScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub report_id: ReportId,
    pub status: Status,
    /// Published score, rounded to three decimals.
    pub final_score: f64,
    /// Combiner output before the visual boost.
    pub aggregate_score: f64,
    pub threshold: f64,
    /// Exactly what was fed into the combiner.
    pub layer_scores: LayerScores,
    pub layers: LayerBreakdown,
    pub normalized_weights: BTreeMap<String, f64>,
    pub features: FeatureSet,
    pub rainfall_mm: f64,
    pub ground_truth: ZoneCheck,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defaulted: Vec<DefaultedSignal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<Reason>,
    /// Profile after the feedback update; `None` if the update failed.
    #[serde(default)]
    pub trust_after: Option<TrustProfile>,
}

impl ValidationResult {
    pub fn is_validated(&self) -> bool {
        self.status == Status::Validated
    }

    pub fn was_defaulted(&self, signal: Signal) -> bool {
        self.defaulted.iter().any(|d| d.signal == signal)
    }
}
