// src/providers/mod.rs
//! Collaborator contracts consumed by the orchestrator, plus thin default
//! implementations. Everything behind these traits is replaceable.
//!
//! Providers return `anyhow::Result`; the orchestrator turns any error or
//! timeout into a neutral default and records it on the result.

pub mod image;
pub mod news_api;
pub mod open_meteo;
pub mod terrain;
pub mod zones;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::report::FeatureSet;

pub use image::{FloodImageModel, GatedImageClassifier, ImagePrediction, MockFloodModel};
pub use news_api::NewsApiCorroboration;
pub use open_meteo::OpenMeteoWeather;
pub use terrain::FixedTerrainProvider;
pub use zones::{FloodZone, PolygonZoneProvider};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub rainfall_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneCheck {
    pub in_flood_zone: bool,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub risk_level: Option<String>,
}

impl ZoneCheck {
    pub fn outside() -> Self {
        Self {
            in_flood_zone: false,
            source: None,
            risk_level: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorroborationSignal {
    /// Already normalised to [0, 1] by the provider.
    pub buzz_score: f64,
    #[serde(default)]
    pub headlines: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEvidence {
    pub valid: bool,
    pub is_flood_detected: bool,
    pub confidence: f64,
    pub water_coverage: f64,
    pub score: f64,
    /// Why a payload was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[async_trait]
pub trait TerrainFeatureProvider: Send + Sync {
    /// Must substitute neutral defaults for missing rasters rather than fail.
    async fn get(&self, lat: f64, lon: f64) -> Result<FeatureSet>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// `Ok(None)` when the provider has no reading for this location.
    async fn get_current(&self, lat: f64, lon: f64) -> Result<Option<WeatherReading>>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait GroundTruthZoneProvider: Send + Sync {
    async fn check(&self, lat: f64, lon: f64) -> Result<ZoneCheck>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait ExternalCorroborationProvider: Send + Sync {
    async fn get(&self, region: &str) -> Result<CorroborationSignal>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait ImageEvidenceClassifier: Send + Sync {
    /// Size-gates the payload before classifying it.
    async fn validate(&self, image: &[u8]) -> Result<ImageEvidence>;
    fn name(&self) -> &'static str;
}
