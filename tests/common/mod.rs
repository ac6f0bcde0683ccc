// tests/common/mod.rs
//
// Shared test doubles: scripted collaborators that record their calls, and a
// few report/context builders.
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use flood_report_validator::{
    config::ValidatorConfig,
    layers::reputation::TrustUpdate,
    layers::{InMemoryTrustStore, TrustStore},
    orchestrator::{Collaborators, ValidationOrchestrator},
    providers::{
        CorroborationSignal, ExternalCorroborationProvider, GroundTruthZoneProvider,
        ImageEvidence, ImageEvidenceClassifier, TerrainFeatureProvider, WeatherProvider,
        WeatherReading, ZoneCheck,
    },
    report::{ContextReport, FeatureSet, Report, ReportId, TrustProfile, UserId},
};

/// What a stub does when called.
#[derive(Clone)]
pub enum Behavior<T> {
    Ok(T),
    Fail(&'static str),
    /// Never completes; only the orchestrator's timeout ends it.
    Hang,
}

impl<T: Clone + Send + Sync> Behavior<T> {
    async fn run(&self) -> Result<T> {
        match self {
            Behavior::Ok(v) => Ok(v.clone()),
            Behavior::Fail(msg) => Err(anyhow!(*msg)),
            Behavior::Hang => std::future::pending::<Result<T>>().await,
        }
    }
}

/// Call log shared between a stub and the test.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn push(&self, call: String) {
        self.0.lock().push(call);
    }
    pub fn count(&self) -> usize {
        self.0.lock().len()
    }
    pub fn calls(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

pub struct Stub<T> {
    behavior: Behavior<T>,
    recorder: Recorder,
}

#[async_trait]
impl TerrainFeatureProvider for Stub<FeatureSet> {
    async fn get(&self, lat: f64, lon: f64) -> Result<FeatureSet> {
        self.recorder.push(format!("{lat},{lon}"));
        self.behavior.run().await
    }
    fn name(&self) -> &'static str {
        "stub-terrain"
    }
}

#[async_trait]
impl WeatherProvider for Stub<Option<WeatherReading>> {
    async fn get_current(&self, lat: f64, lon: f64) -> Result<Option<WeatherReading>> {
        self.recorder.push(format!("{lat},{lon}"));
        self.behavior.run().await
    }
    fn name(&self) -> &'static str {
        "stub-weather"
    }
}

#[async_trait]
impl GroundTruthZoneProvider for Stub<ZoneCheck> {
    async fn check(&self, lat: f64, lon: f64) -> Result<ZoneCheck> {
        self.recorder.push(format!("{lat},{lon}"));
        self.behavior.run().await
    }
    fn name(&self) -> &'static str {
        "stub-zones"
    }
}

#[async_trait]
impl ExternalCorroborationProvider for Stub<CorroborationSignal> {
    async fn get(&self, region: &str) -> Result<CorroborationSignal> {
        self.recorder.push(region.to_string());
        self.behavior.run().await
    }
    fn name(&self) -> &'static str {
        "stub-news"
    }
}

#[async_trait]
impl ImageEvidenceClassifier for Stub<ImageEvidence> {
    async fn validate(&self, image: &[u8]) -> Result<ImageEvidence> {
        self.recorder.push(image.len().to_string());
        self.behavior.run().await
    }
    fn name(&self) -> &'static str {
        "stub-image"
    }
}

/// Trust store whose reads and writes always fail.
pub struct FailingTrustStore;

#[async_trait]
impl TrustStore for FailingTrustStore {
    async fn get(&self, _user: UserId) -> Result<Option<TrustProfile>> {
        Err(anyhow!("user store offline"))
    }
    async fn update(&self, _user: UserId, _update: TrustUpdate) -> Result<TrustProfile> {
        Err(anyhow!("user store offline"))
    }
}

/// Trust store that always answers with the same profile and ignores updates.
pub struct FrozenTrustStore(pub TrustProfile);

#[async_trait]
impl TrustStore for FrozenTrustStore {
    async fn get(&self, _user: UserId) -> Result<Option<TrustProfile>> {
        Ok(Some(self.0))
    }
    async fn update(&self, _user: UserId, _update: TrustUpdate) -> Result<TrustProfile> {
        Ok(self.0)
    }
}

pub fn neutral_image() -> ImageEvidence {
    ImageEvidence {
        valid: true,
        is_flood_detected: false,
        confidence: 0.5,
        water_coverage: 0.0,
        score: 0.5,
        reason: None,
    }
}

pub fn flood_image() -> ImageEvidence {
    ImageEvidence {
        valid: true,
        is_flood_detected: true,
        confidence: 0.92,
        water_coverage: 0.45,
        score: 1.0,
        reason: None,
    }
}

pub fn buzz(score: f64) -> CorroborationSignal {
    CorroborationSignal {
        buzz_score: score,
        headlines: vec!["Heavy rain lashes coastal Odisha".to_string()],
        source: Some("stub".to_string()),
    }
}

pub fn zone_hit() -> ZoneCheck {
    ZoneCheck {
        in_flood_zone: true,
        source: Some("Bhuvan-2024".to_string()),
        risk_level: Some("High".to_string()),
    }
}

/// Scripted collaborator answers; defaults are healthy and neutral.
#[derive(Clone)]
pub struct Stubs {
    pub terrain: Behavior<FeatureSet>,
    pub weather: Behavior<Option<WeatherReading>>,
    pub zone: Behavior<ZoneCheck>,
    pub news: Behavior<CorroborationSignal>,
    pub image: Behavior<ImageEvidence>,
}

impl Default for Stubs {
    fn default() -> Self {
        Self {
            terrain: Behavior::Ok(FeatureSet::neutral()),
            weather: Behavior::Ok(Some(WeatherReading { rainfall_mm: 0.0 })),
            zone: Behavior::Ok(ZoneCheck::outside()),
            news: Behavior::Ok(buzz(0.0)),
            image: Behavior::Ok(neutral_image()),
        }
    }
}

#[derive(Clone, Default)]
pub struct Calls {
    pub terrain: Recorder,
    pub weather: Recorder,
    pub zone: Recorder,
    pub news: Recorder,
    pub image: Recorder,
}

pub struct Harness {
    pub orchestrator: Arc<ValidationOrchestrator>,
    pub trust: Arc<InMemoryTrustStore>,
    pub calls: Calls,
}

impl Stubs {
    pub fn build(self, config: ValidatorConfig) -> Harness {
        let trust = Arc::new(InMemoryTrustStore::new());
        let (orchestrator, calls) = self.build_with_trust(config, trust.clone());
        Harness {
            orchestrator: Arc::new(orchestrator),
            trust,
            calls,
        }
    }

    pub fn build_with_trust(
        self,
        config: ValidatorConfig,
        trust: Arc<dyn TrustStore>,
    ) -> (ValidationOrchestrator, Calls) {
        let calls = Calls::default();
        let collaborators = Collaborators {
            terrain: Arc::new(Stub {
                behavior: self.terrain,
                recorder: calls.terrain.clone(),
            }),
            weather: Arc::new(Stub {
                behavior: self.weather,
                recorder: calls.weather.clone(),
            }),
            zones: Arc::new(Stub {
                behavior: self.zone,
                recorder: calls.zone.clone(),
            }),
            corroboration: Arc::new(Stub {
                behavior: self.news,
                recorder: calls.news.clone(),
            }),
            images: Arc::new(Stub {
                behavior: self.image,
                recorder: calls.image.clone(),
            }),
            trust,
        };
        (ValidationOrchestrator::new(collaborators, config), calls)
    }
}

pub fn ts(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_724_140_800 + offset_secs, 0).unwrap()
}

/// Near Cuttack, inside the built-in demo flood zone.
pub const LAT: f64 = 20.4625;
pub const LON: f64 = 85.8830;

pub fn report(id: ReportId, user: UserId) -> Report {
    Report::new(id, user, LAT, LON, 0.8, ts(0))
}

/// `n` reports within ~100 m of (`lat`, `lon`), all with the same depth.
pub fn dense_context(n: usize, lat: f64, lon: f64, depth_m: f64) -> Vec<ContextReport> {
    (0..n)
        .map(|i| ContextReport {
            id: Some(10_000 + i as u64),
            lat: lat + 0.0001 * (i % 5) as f64,
            lon: lon + 0.0001 * (i / 5) as f64,
            depth_m,
            timestamp: ts(-(i as i64) * 60),
        })
        .collect()
}

/// Terrain that maxes out the physical layer.
pub fn floodplain() -> FeatureSet {
    FeatureSet {
        elevation: 18.0,
        hand: 0.5,
        slope: 0.0,
        elevation_diff: -3.0,
    }
}

/// Terrain that bottoms out the physical layer (0.12).
pub fn hilltop() -> FeatureSet {
    FeatureSet {
        elevation: 420.0,
        hand: 15.0,
        slope: 35.0,
        elevation_diff: 12.0,
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}
