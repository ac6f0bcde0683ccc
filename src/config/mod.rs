// src/config/mod.rs
//! Runtime configuration.

pub mod validator;

pub use validator::{
    CacheConfig, ConsensusConfig, CorroborationConfig, DecisionConfig, InputConfig, ModelConfig,
    TimeoutConfig, ValidatorConfig,
};
