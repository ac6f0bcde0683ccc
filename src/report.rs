//! # Report model
//! Value types shared by every layer: the incoming report, the context reports
//! used for consensus, terrain features and per-user trust.
//!
//! All of these are plain data. The core reads them and never mutates a
//! `Report` once scoring starts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub type ReportId = u64;
pub type UserId = u64;

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Default upper bound for a reported depth (metres).
pub const DEFAULT_MAX_DEPTH_M: f64 = 20.0;

/// A crowd-submitted flood report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub user_id: UserId,
    pub lat: f64,
    pub lon: f64,
    /// Reported water depth in metres.
    pub depth_m: f64,
    pub timestamp: DateTime<Utc>,
    /// Optional photo evidence (raw JPEG/PNG bytes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<u8>>,
}

impl Report {
    pub fn new(
        id: ReportId,
        user_id: UserId,
        lat: f64,
        lon: f64,
        depth_m: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            lat,
            lon,
            depth_m,
            timestamp,
            image: None,
        }
    }

    pub fn with_image(mut self, bytes: Vec<u8>) -> Self {
        self.image = Some(bytes);
        self
    }

    /// Reject out-of-domain coordinates and depths before any scoring.
    pub fn check_bounds(&self, max_depth_m: f64) -> Result<(), ValidationError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(ValidationError::invalid(
                "latitude",
                self.lat,
                "must be within [-90, 90]",
            ));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(ValidationError::invalid(
                "longitude",
                self.lon,
                "must be within [-180, 180]",
            ));
        }
        if !self.depth_m.is_finite() || self.depth_m < 0.0 {
            return Err(ValidationError::invalid(
                "depth",
                self.depth_m,
                "must be a non-negative number",
            ));
        }
        if self.depth_m > max_depth_m {
            return Err(ValidationError::invalid(
                "depth",
                self.depth_m,
                "exceeds the configured maximum depth",
            ));
        }
        Ok(())
    }

    pub fn as_context(&self) -> ContextReport {
        ContextReport {
            id: Some(self.id),
            lat: self.lat,
            lon: self.lon,
            depth_m: self.depth_m,
            timestamp: self.timestamp,
        }
    }
}

/// A recent report used as context for consensus and outlier checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextReport {
    /// Caller-supplied context may carry no id.
    #[serde(default)]
    pub id: Option<ReportId>,
    pub lat: f64,
    pub lon: f64,
    pub depth_m: f64,
    pub timestamp: DateTime<Utc>,
}

/// Terrain features sampled at the report location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub elevation: f64,
    /// Height above nearest drainage, metres.
    pub hand: f64,
    /// Slope in degrees.
    pub slope: f64,
    /// Elevation minus the neighbourhood mean, metres.
    pub elevation_diff: f64,
}

impl FeatureSet {
    /// Safe neutral defaults used when terrain data is missing.
    pub const fn neutral() -> Self {
        Self {
            elevation: 0.0,
            hand: 5.0,
            slope: 2.0,
            elevation_diff: 0.0,
        }
    }
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Per-user reliability estimate and report counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustProfile {
    pub trust_score: f64,
    pub total_reports: u64,
    pub verified_reports: u64,
}

impl TrustProfile {
    pub const INITIAL_TRUST: f64 = 0.5;
}

impl Default for TrustProfile {
    fn default() -> Self {
        Self {
            trust_score: Self::INITIAL_TRUST,
            total_reports: 0,
            verified_reports: 0,
        }
    }
}

/// Great-circle distance in kilometres (haversine).
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * c
}

/// Round to three decimals, the precision every published score uses.
pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

pub(crate) fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(lat: f64, lon: f64, depth: f64) -> Report {
        Report::new(1, 1, lat, lon, depth, Utc::now())
    }

    #[test]
    fn bounds_accept_edges() {
        assert!(report(90.0, 180.0, 0.0).check_bounds(20.0).is_ok());
        assert!(report(-90.0, -180.0, 20.0).check_bounds(20.0).is_ok());
    }

    #[test]
    fn bounds_reject_out_of_domain() {
        assert!(report(90.5, 0.0, 1.0).check_bounds(20.0).is_err());
        assert!(report(0.0, -181.0, 1.0).check_bounds(20.0).is_err());
        assert!(report(0.0, 0.0, -0.1).check_bounds(20.0).is_err());
        assert!(report(0.0, 0.0, 25.0).check_bounds(20.0).is_err());
        assert!(report(f64::NAN, 0.0, 1.0).check_bounds(20.0).is_err());
    }

    #[test]
    fn haversine_one_degree_latitude() {
        let d = haversine_km(20.0, 85.0, 21.0, 85.0);
        assert!((d - 111.19).abs() < 0.1, "got {d}");
        assert!(haversine_km(20.0, 85.0, 20.0, 85.0).abs() < 1e-9);
    }

    #[test]
    fn round3_matches_published_precision() {
        assert!((round3(0.80620) - 0.806).abs() < 1e-12);
        assert!((round3(0.12) - 0.12).abs() < 1e-12);
    }
}
