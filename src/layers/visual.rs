//! Layer 5: optional visual evidence.
//!
//! Inert without a (valid) photo: the layer reports a neutral 0.5 with
//! `applied = false`. This layer is not a combiner input; a flood-positive
//! photo only adds a boost after the combiner has run.

use serde::{Deserialize, Serialize};

use crate::providers::ImageEvidence;
use crate::report::round3;

const BASE_SCORE: f64 = 0.5;
const FLOOD_DETECTED_BONUS: f64 = 0.3;
const WATER_COVERAGE_BONUS: f64 = 0.2;
const WATER_COVERAGE_MIN: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualScore {
    pub score: f64,
    pub applied: bool,
    pub is_flood: bool,
    pub water_coverage: f64,
    pub confidence: f64,
}

impl VisualScore {
    pub const fn inert() -> Self {
        Self {
            score: BASE_SCORE,
            applied: false,
            is_flood: false,
            water_coverage: 0.0,
            confidence: 0.0,
        }
    }

    /// Applied and flood-positive.
    pub fn flood_positive(&self) -> bool {
        self.applied && self.is_flood
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VisualEvidenceScorer;

impl VisualEvidenceScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, evidence: Option<&ImageEvidence>) -> VisualScore {
        let Some(ev) = evidence.filter(|e| e.valid) else {
            return VisualScore::inert();
        };

        let mut score = BASE_SCORE;
        if ev.is_flood_detected {
            score += FLOOD_DETECTED_BONUS;
        }
        if ev.water_coverage > WATER_COVERAGE_MIN {
            score += WATER_COVERAGE_BONUS;
        }

        VisualScore {
            score: round3(score.min(1.0)),
            applied: true,
            is_flood: ev.is_flood_detected,
            water_coverage: round3(ev.water_coverage),
            confidence: round3(ev.confidence),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(valid: bool, flood: bool, water: f64) -> ImageEvidence {
        ImageEvidence {
            valid,
            is_flood_detected: flood,
            confidence: 0.9,
            water_coverage: water,
            score: 0.0,
            reason: None,
        }
    }

    #[test]
    fn no_image_is_inert() {
        let s = VisualEvidenceScorer::new().score(None);
        assert_eq!(s, VisualScore::inert());
        assert!(!s.flood_positive());
    }

    #[test]
    fn rejected_image_is_inert() {
        let s = VisualEvidenceScorer::new().score(Some(&evidence(false, true, 0.9)));
        assert!(!s.applied);
        assert_eq!(s.score, 0.5);
    }

    #[test]
    fn bonuses_stack_and_cap() {
        let scorer = VisualEvidenceScorer::new();
        assert_eq!(scorer.score(Some(&evidence(true, false, 0.1))).score, 0.5);
        assert_eq!(scorer.score(Some(&evidence(true, true, 0.1))).score, 0.8);
        assert_eq!(scorer.score(Some(&evidence(true, false, 0.5))).score, 0.7);
        let full = scorer.score(Some(&evidence(true, true, 0.5)));
        assert_eq!(full.score, 1.0);
        assert!(full.flood_positive());
    }
}
