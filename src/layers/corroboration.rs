//! Layer 4: external corroboration (news / social buzz).

use serde::{Deserialize, Serialize};

use crate::providers::CorroborationSignal;
use crate::report::{clamp01, round3};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorroborationScore {
    pub score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headlines: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalCorroborationScorer;

impl ExternalCorroborationScorer {
    pub fn new() -> Self {
        Self
    }

    /// Buzz maps straight to the layer score. No signal scores 0.0.
    pub fn score(&self, signal: Option<&CorroborationSignal>) -> CorroborationScore {
        match signal {
            Some(s) => CorroborationScore {
                score: round3(clamp01(s.buzz_score)),
                headlines: s.headlines.clone(),
                source: s.source.clone(),
            },
            None => CorroborationScore {
                score: 0.0,
                headlines: Vec::new(),
                source: None,
            },
        }
    }
}
