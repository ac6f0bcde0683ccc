//! Layer 1: physical plausibility.
//!
//! Rule-based terrain score: a flood is plausible near drainage (low HAND),
//! on flat ground and in local depressions. Three independent sub-scores are
//! blended 0.4 / 0.4 / 0.2 (HAND, local elevation, slope).

use serde::{Deserialize, Serialize};

use crate::report::{clamp01, round3, FeatureSet};

/// Above this HAND a flood is very unlikely.
const MAX_HAND_M: f64 = 10.0;
/// Above this HAND a flood is suspicious.
const SUSPICIOUS_HAND_M: f64 = 5.0;
/// Water does not stand on slopes steeper than this.
const STEEP_SLOPE_DEG: f64 = 15.0;
/// Standing water is impossible above this slope.
const MAX_SLOPE_DEG: f64 = 30.0;
/// A point this much higher than its surroundings is a local peak.
const LOCAL_PEAK_DIFF_M: f64 = 5.0;
/// A point this much lower than its surroundings is a local depression.
const LOCAL_DEPRESSION_DIFF_M: f64 = -2.0;

const W_HAND: f64 = 0.4;
const W_ELEVATION: f64 = 0.4;
const W_SLOPE: f64 = 0.2;

/// Layer-1 output. All values rounded to three decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalScore {
    pub score: f64,
    pub hand_score: f64,
    pub slope_score: f64,
    pub elevation_score: f64,
    /// Set by the orchestrator when an authoritative flood zone boosted `score`.
    #[serde(default)]
    pub zone_boost: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PhysicalPlausibilityScorer;

impl PhysicalPlausibilityScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score a report location. `_depth_m` is accepted for interface symmetry
    /// with the other layers; terrain alone decides plausibility.
    pub fn score(&self, _lat: f64, _lon: f64, _depth_m: f64, features: &FeatureSet) -> PhysicalScore {
        let hand_score = hand_subscore(features.hand);
        let slope_score = slope_subscore(features.slope);
        let elevation_score = elevation_subscore(features.elevation_diff);

        let score = clamp01(W_HAND * hand_score + W_ELEVATION * elevation_score + W_SLOPE * slope_score);

        PhysicalScore {
            score: round3(score),
            hand_score: round3(hand_score),
            slope_score: round3(slope_score),
            elevation_score: round3(elevation_score),
            zone_boost: false,
        }
    }
}

/// HAND sub-score: 1.0 near river level, linear 1.0 → 0.4 over 1..=5 m.
pub fn hand_subscore(hand: f64) -> f64 {
    if hand > MAX_HAND_M {
        0.1
    } else if hand > SUSPICIOUS_HAND_M {
        0.4
    } else if hand < 1.0 {
        1.0
    } else {
        1.0 - 0.15 * (hand - 1.0)
    }
}

/// Slope sub-score: flatter ground retains water.
pub fn slope_subscore(slope_deg: f64) -> f64 {
    if slope_deg > MAX_SLOPE_DEG {
        0.0
    } else if slope_deg > STEEP_SLOPE_DEG {
        0.3
    } else {
        1.0 - 0.046 * slope_deg
    }
}

/// Local elevation context sub-score.
pub fn elevation_subscore(elevation_diff: f64) -> f64 {
    if elevation_diff > LOCAL_PEAK_DIFF_M {
        0.2
    } else if elevation_diff < LOCAL_DEPRESSION_DIFF_M {
        1.0
    } else {
        0.8
    }
}
