//! Spatial consensus via density clustering (DBSCAN over great-circle distance).
//!
//! Reports that land inside a dense group of other recent reports are more
//! likely to be genuine; isolated reports are noise. Labels are recomputed on
//! every call and carry no identity between calls.

use serde::{Deserialize, Serialize};

use crate::report::{haversine_km, ContextReport};

/// Label assigned to points that belong to no cluster.
pub const NOISE: i32 = -1;

pub const DEFAULT_EPS_KM: f64 = 2.0;
pub const DEFAULT_MIN_SAMPLES: usize = 3;

/// Score when there is too little context to cluster.
const NEUTRAL_SCORE: f64 = 0.5;
const NOISE_SCORE: f64 = 0.2;

/// Per-call clustering result for the candidate report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsensusOutcome {
    pub score: f64,
    /// Candidate's cluster label; `None` when clustering was skipped.
    pub label: Option<i32>,
    pub cluster_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub cluster_id: i32,
    pub size: usize,
    pub center_lat: f64,
    pub center_lon: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub n_clusters: usize,
    pub n_noise: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<ClusterInfo>,
}

#[derive(Debug, Clone, Copy)]
pub struct SpatialConsensusAnalyzer {
    eps_km: f64,
    min_samples: usize,
}

impl Default for SpatialConsensusAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_EPS_KM, DEFAULT_MIN_SAMPLES)
    }
}

impl SpatialConsensusAnalyzer {
    /// `min_samples` counts the point itself, so 3 means "two other reports nearby".
    pub fn new(eps_km: f64, min_samples: usize) -> Self {
        Self {
            eps_km: eps_km.max(0.0),
            min_samples: min_samples.max(1),
        }
    }

    pub fn eps_km(&self) -> f64 {
        self.eps_km
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Cluster `(lat, lon)` points. Returns one label per point, `NOISE` for outliers.
    pub fn fit_predict(&self, points: &[(f64, f64)]) -> Vec<i32> {
        let n = points.len();
        if n < self.min_samples {
            return vec![NOISE; n];
        }

        let mut labels: Vec<Option<i32>> = vec![None; n];
        let mut next_cluster = 0i32;

        for p in 0..n {
            if labels[p].is_some() {
                continue;
            }
            let neighbors = self.region_query(points, p);
            if neighbors.len() < self.min_samples {
                labels[p] = Some(NOISE);
                continue;
            }

            let cluster = next_cluster;
            next_cluster += 1;
            labels[p] = Some(cluster);

            let mut queue = neighbors;
            let mut i = 0;
            while i < queue.len() {
                let q = queue[i];
                i += 1;
                match labels[q] {
                    Some(NOISE) => labels[q] = Some(cluster), // border point
                    Some(_) => continue,
                    None => {
                        labels[q] = Some(cluster);
                        let q_neighbors = self.region_query(points, q);
                        if q_neighbors.len() >= self.min_samples {
                            queue.extend(q_neighbors);
                        }
                    }
                }
            }
        }

        labels.into_iter().map(|l| l.unwrap_or(NOISE)).collect()
    }

    /// Cluster score for `candidate` against `context`.
    ///
    /// The candidate is matched by id inside `context`; if absent it is appended
    /// for this call only.
    pub fn assess(&self, candidate: &ContextReport, context: &[ContextReport]) -> ConsensusOutcome {
        if context.len() < 2 {
            return ConsensusOutcome {
                score: NEUTRAL_SCORE,
                label: None,
                cluster_size: 0,
            };
        }

        let existing = candidate
            .id
            .and_then(|id| context.iter().position(|r| r.id == Some(id)));

        let mut points: Vec<(f64, f64)> = context.iter().map(|r| (r.lat, r.lon)).collect();
        let idx = match existing {
            Some(i) => i,
            None => {
                points.push((candidate.lat, candidate.lon));
                points.len() - 1
            }
        };

        let labels = self.fit_predict(&points);
        let label = labels[idx];
        let cluster_size = if label == NOISE {
            0
        } else {
            labels.iter().filter(|&&l| l == label).count()
        };

        ConsensusOutcome {
            score: score_for_cluster(label, cluster_size),
            label: Some(label),
            cluster_size,
        }
    }

    pub fn cluster_score(&self, candidate: &ContextReport, context: &[ContextReport]) -> f64 {
        self.assess(candidate, context).score
    }

    /// Cluster statistics over a set of reports.
    pub fn analyze_clusters(&self, reports: &[ContextReport]) -> ClusterSummary {
        if reports.is_empty() {
            return ClusterSummary::default();
        }
        let points: Vec<(f64, f64)> = reports.iter().map(|r| (r.lat, r.lon)).collect();
        let labels = self.fit_predict(&points);

        let n_noise = labels.iter().filter(|&&l| l == NOISE).count();
        let n_clusters = labels.iter().copied().max().map_or(0, |m| (m + 1).max(0) as usize);

        let clusters = (0..n_clusters as i32)
            .map(|cluster_id| {
                let members: Vec<&(f64, f64)> = points
                    .iter()
                    .zip(&labels)
                    .filter(|(_, &l)| l == cluster_id)
                    .map(|(p, _)| p)
                    .collect();
                let size = members.len();
                let (sum_lat, sum_lon) = members
                    .iter()
                    .fold((0.0, 0.0), |(a, b), (lat, lon)| (a + lat, b + lon));
                ClusterInfo {
                    cluster_id,
                    size,
                    center_lat: sum_lat / size as f64,
                    center_lon: sum_lon / size as f64,
                }
            })
            .collect();

        ClusterSummary {
            n_clusters,
            n_noise,
            clusters,
        }
    }

    /// Indices within `eps_km` of `points[i]`, including `i` itself.
    fn region_query(&self, points: &[(f64, f64)], i: usize) -> Vec<usize> {
        let (lat, lon) = points[i];
        points
            .iter()
            .enumerate()
            .filter(|(_, &(la, lo))| haversine_km(lat, lon, la, lo) <= self.eps_km)
            .map(|(j, _)| j)
            .collect()
    }
}

/// Map a cluster label and size to a consensus score.
pub fn score_for_cluster(label: i32, cluster_size: usize) -> f64 {
    if label == NOISE {
        NOISE_SCORE
    } else if cluster_size >= 10 {
        1.0
    } else if cluster_size >= 5 {
        0.85
    } else if cluster_size >= 3 {
        0.7
    } else {
        NEUTRAL_SCORE
    }
}
