//! Flood report validator: server entrypoint.
//! Wires collaborators, loads the combiner and serves the HTTP API.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use flood_report_validator::{
    api::{self, AppState},
    config::ValidatorConfig,
    layers::{InMemoryTrustStore, FUSED_LAYERS},
    metrics::Metrics,
    orchestrator::{Collaborators, ValidationOrchestrator},
    providers::{
        FixedTerrainProvider, GatedImageClassifier, MockFloodModel, NewsApiCorroboration,
        OpenMeteoWeather, PolygonZoneProvider,
    },
    telemetry, WeightModel,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = ValidatorConfig::load_default()?;

    let zones = match &cfg.input.zones_path {
        Some(p) => PolygonZoneProvider::from_path(p)?,
        None => PolygonZoneProvider::builtin(),
    };
    let news = NewsApiCorroboration::from_env()?;
    if !news.has_key() {
        warn!("NEWS_API_KEY not set; corroboration will score 0");
    }

    let collaborators = Collaborators {
        terrain: Arc::new(FixedTerrainProvider::neutral()),
        weather: Arc::new(OpenMeteoWeather::new()?),
        zones: Arc::new(zones),
        corroboration: Arc::new(news),
        images: Arc::new(GatedImageClassifier::new(MockFloodModel)),
        trust: Arc::new(InMemoryTrustStore::new()),
    };

    let orchestrator = ValidationOrchestrator::new(collaborators, cfg.clone());
    let orchestrator = match WeightModel::load(&cfg.model.weights_path, FUSED_LAYERS) {
        Ok(model) => {
            info!(path = %cfg.model.weights_path.display(), "loaded trained weights");
            orchestrator.with_model(model)?
        }
        Err(e) => {
            warn!(error = %e, "no trained weights, using uniform combiner");
            orchestrator
        }
    };

    let metrics = Metrics::init(cfg.decision.threshold)?;
    let state = AppState::new(Arc::new(orchestrator));
    let app = api::router(state).merge(metrics.router());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
