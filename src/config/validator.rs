// src/config/validator.rs
//! Validator settings loaded from TOML.
//!
//! Lookup order for `load_default`:
//! 1) `$FLOOD_VALIDATOR_CONFIG`
//! 2) `config/validator.toml`
//! 3) built-in defaults
//!
//! Every field has a default, so a partial file is fine. Out-of-range values
//! are replaced or clamped on load rather than rejected.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::aggregator::DEFAULT_LEARNING_RATE;
use crate::decision::DEFAULT_THRESHOLD;
use crate::layers::consensus::{DEFAULT_EPS_KM, DEFAULT_MIN_SAMPLES};
use crate::report::DEFAULT_MAX_DEPTH_M;
use crate::rolling::DEFAULT_CACHE_CAPACITY;

pub const ENV_PATH: &str = "FLOOD_VALIDATOR_CONFIG";
const DEFAULT_PATH: &str = "config/validator.toml";
const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub decision: DecisionConfig,
    pub cache: CacheConfig,
    pub consensus: ConsensusConfig,
    pub timeouts: TimeoutConfig,
    pub corroboration: CorroborationConfig,
    pub model: ModelConfig,
    pub input: InputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub threshold: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub eps_km: f64,
    pub min_samples: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            eps_km: DEFAULT_EPS_KM,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

/// Per-collaborator timeouts in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub terrain_ms: u64,
    pub weather_ms: u64,
    pub zone_ms: u64,
    pub corroboration_ms: u64,
    pub image_ms: u64,
    pub trust_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            terrain_ms: DEFAULT_TIMEOUT_MS,
            weather_ms: DEFAULT_TIMEOUT_MS,
            zone_ms: DEFAULT_TIMEOUT_MS,
            corroboration_ms: DEFAULT_TIMEOUT_MS,
            image_ms: DEFAULT_TIMEOUT_MS,
            trust_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl TimeoutConfig {
    /// Same timeout for every collaborator.
    pub fn uniform(ms: u64) -> Self {
        Self {
            terrain_ms: ms,
            weather_ms: ms,
            zone_ms: ms,
            corroboration_ms: ms,
            image_ms: ms,
            trust_ms: ms,
        }
    }

    pub fn terrain(&self) -> Duration {
        Duration::from_millis(self.terrain_ms)
    }
    pub fn weather(&self) -> Duration {
        Duration::from_millis(self.weather_ms)
    }
    pub fn zone(&self) -> Duration {
        Duration::from_millis(self.zone_ms)
    }
    pub fn corroboration(&self) -> Duration {
        Duration::from_millis(self.corroboration_ms)
    }
    pub fn image(&self) -> Duration {
        Duration::from_millis(self.image_ms)
    }
    pub fn trust(&self) -> Duration {
        Duration::from_millis(self.trust_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorroborationConfig {
    /// Region name sent to the news provider.
    pub region: String,
}

impl Default for CorroborationConfig {
    fn default() -> Self {
        Self {
            region: "Odisha".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub weights_path: PathBuf,
    pub learning_rate: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights_path: PathBuf::from("models/weight_network.json"),
            learning_rate: DEFAULT_LEARNING_RATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub max_depth_m: f64,
    /// Optional GeoJSON file of authoritative flood zones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones_path: Option<PathBuf>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_depth_m: DEFAULT_MAX_DEPTH_M,
            zones_path: None,
        }
    }
}

impl ValidatorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: ValidatorConfig = toml::from_str(s).context("parsing validator config")?;
        Ok(cfg.sanitized())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading validator config from {}", path.display()))?;
        Self::from_toml_str(&data)
    }

    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
        let default_p = PathBuf::from(DEFAULT_PATH);
        if default_p.exists() {
            return Self::load_from_file(&default_p);
        }
        Ok(Self::default())
    }

    /// Clamp or replace values that would break the pipeline.
    pub fn sanitized(mut self) -> Self {
        if self.decision.threshold.is_finite() {
            self.decision.threshold = self.decision.threshold.clamp(0.0, 1.0);
        } else {
            self.decision.threshold = DEFAULT_THRESHOLD;
        }

        self.cache.capacity = self.cache.capacity.max(1);
        self.consensus.min_samples = self.consensus.min_samples.max(1);
        if !(self.consensus.eps_km.is_finite() && self.consensus.eps_km > 0.0) {
            self.consensus.eps_km = DEFAULT_EPS_KM;
        }

        if !(self.model.learning_rate.is_finite() && self.model.learning_rate > 0.0) {
            self.model.learning_rate = DEFAULT_LEARNING_RATE;
        }
        if !(self.input.max_depth_m.is_finite() && self.input.max_depth_m > 0.0) {
            self.input.max_depth_m = DEFAULT_MAX_DEPTH_M;
        }

        self.corroboration.region = self.corroboration.region.trim().to_string();
        if self.corroboration.region.is_empty() {
            self.corroboration.region = CorroborationConfig::default().region;
        }
        self
    }
}
