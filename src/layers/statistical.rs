//! Layer 2: statistical consistency.
//!
//! Rule-based checks that complement density clustering:
//! - spatial: how many recent reports sit right next to this one,
//! - temporal: whether recent rainfall makes a flood believable,
//! - outlier: whether the reported depth agrees with nearby depths.
//!
//! Distances here are plain Euclidean in degrees, which is accurate enough at
//! a few hundred metres.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::report::{round3, ContextReport};

/// ~220 m.
const SPATIAL_RADIUS_DEG: f64 = 0.002;
/// ~500 m.
const OUTLIER_RADIUS_DEG: f64 = 0.005;
const OUTLIER_MIN_NEIGHBORS: usize = 3;
const FLAT_DEPTH_TOLERANCE_M: f64 = 0.5;

const W_SPATIAL: f64 = 0.5;
const W_TEMPORAL: f64 = 0.3;
const W_OUTLIER: f64 = 0.2;

/// Weight of the clustering score when blended with the rule-based score.
pub const CLUSTER_BLEND_WEIGHT: f64 = 0.6;

/// Rule-based layer-2 output, rounded to three decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticalScore {
    pub score: f64,
    pub spatial_score: f64,
    pub temporal_score: f64,
    pub outlier_score: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticalConsistencyScorer;

impl StatisticalConsistencyScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(
        &self,
        lat: f64,
        lon: f64,
        depth_m: f64,
        _timestamp: DateTime<Utc>,
        context: &[ContextReport],
        rainfall_24h_mm: f64,
    ) -> StatisticalScore {
        let spatial = spatial_subscore(lat, lon, context);
        let temporal = temporal_subscore(rainfall_24h_mm);
        let outlier = outlier_subscore(lat, lon, depth_m, context);

        let score = W_SPATIAL * spatial + W_TEMPORAL * temporal + W_OUTLIER * outlier;

        StatisticalScore {
            score: round3(score),
            spatial_score: round3(spatial),
            temporal_score: round3(temporal),
            outlier_score: round3(outlier),
        }
    }
}

/// Blend the clustering score with the rule-based score into the published
/// statistical layer score.
pub fn blend_with_cluster(cluster_score: f64, rule_score: f64) -> f64 {
    CLUSTER_BLEND_WEIGHT * cluster_score + (1.0 - CLUSTER_BLEND_WEIGHT) * rule_score
}

fn degree_distance(lat: f64, lon: f64, r: &ContextReport) -> f64 {
    ((r.lat - lat).powi(2) + (r.lon - lon).powi(2)).sqrt()
}

/// Fixed-radius neighbour count.
pub fn spatial_subscore(lat: f64, lon: f64, context: &[ContextReport]) -> f64 {
    if context.is_empty() {
        return 0.5;
    }
    let nearby = context
        .iter()
        .filter(|r| degree_distance(lat, lon, r) < SPATIAL_RADIUS_DEG)
        .count();
    match nearby {
        n if n >= 5 => 1.0,
        n if n >= 3 => 0.8,
        n if n >= 1 => 0.6,
        _ => 0.4,
    }
}

/// Rainfall over the last 24 h.
pub fn temporal_subscore(rainfall_mm: f64) -> f64 {
    if rainfall_mm > 100.0 {
        1.0
    } else if rainfall_mm > 50.0 {
        0.8
    } else if rainfall_mm > 10.0 {
        0.6
    } else if rainfall_mm > 0.0 {
        0.4
    } else {
        // a flood with no rain is suspicious unless it is a river flood
        0.2
    }
}

/// Depth z-score against nearby reports.
pub fn outlier_subscore(lat: f64, lon: f64, depth_m: f64, context: &[ContextReport]) -> f64 {
    let depths: Vec<f64> = context
        .iter()
        .filter(|r| degree_distance(lat, lon, r) < OUTLIER_RADIUS_DEG)
        .map(|r| r.depth_m)
        .collect();

    if depths.len() < OUTLIER_MIN_NEIGHBORS {
        return 0.5;
    }

    let n = depths.len() as f64;
    let mean = depths.iter().sum::<f64>() / n;
    // sample standard deviation
    let var = depths.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = var.sqrt();

    if std == 0.0 {
        return if (depth_m - mean).abs() < FLAT_DEPTH_TOLERANCE_M {
            1.0
        } else {
            0.2
        };
    }

    let z = (depth_m - mean).abs() / std;
    if z < 1.0 {
        1.0
    } else if z < 2.0 {
        0.7
    } else {
        0.2
    }
}
