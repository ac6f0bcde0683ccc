//! Current precipitation from Open-Meteo (no API key).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;

use super::{WeatherProvider, WeatherReading};

pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Deserialize)]
struct Resp {
    #[serde(default)]
    current: Option<Current>,
}

#[derive(Debug, Deserialize)]
struct Current {
    #[serde(default)]
    precipitation: Option<f64>,
}

pub struct OpenMeteoWeather {
    http: reqwest::Client,
    url: String,
}

impl OpenMeteoWeather {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("flood-report-validator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(5))
            .build()
            .context("building weather http client")?;
        Ok(Self {
            http,
            url: OPEN_METEO_URL.to_string(),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// `None` when the payload carries no current precipitation.
    pub fn parse_response(body: &str) -> Result<Option<WeatherReading>> {
        let resp: Resp = serde_json::from_str(body).context("parsing open-meteo response")?;
        Ok(resp
            .current
            .and_then(|c| c.precipitation)
            .filter(|mm| mm.is_finite())
            .map(|mm| WeatherReading {
                rainfall_mm: mm.max(0.0),
            }))
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoWeather {
    async fn get_current(&self, lat: f64, lon: f64) -> Result<Option<WeatherReading>> {
        let resp = self
            .http
            .get(&self.url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("current", "precipitation,rain,showers".to_string()),
                ("timezone", "auto".to_string()),
                ("forecast_days", "1".to_string()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, provider = "Open-Meteo", "provider http error");
                counter!("provider_errors_total", "provider" => "open_meteo").increment(1);
                return Err(e).context("open-meteo get()");
            }
        };
        let body = resp.text().await.context("open-meteo .text()")?;
        Self::parse_response(&body)
    }

    fn name(&self) -> &'static str {
        "Open-Meteo"
    }
}
