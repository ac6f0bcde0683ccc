//! NewsAPI "buzz" for a region. Requires `NEWS_API_KEY`; without it the
//! provider reports an empty signal instead of calling out.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;

use super::{CorroborationSignal, ExternalCorroborationProvider};

pub const NEWS_API_URL: &str = "https://newsapi.org/v2/everything";
/// Ten matching articles saturate the signal.
const BUZZ_PER_ARTICLE: f64 = 0.1;
const MAX_HEADLINES: usize = 3;

#[derive(Debug, Deserialize)]
struct Resp {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: Option<String>,
}

pub struct NewsApiCorroboration {
    http: reqwest::Client,
    api_key: String,
    url: String,
}

impl NewsApiCorroboration {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("flood-report-validator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(5))
            .build()
            .context("building news http client")?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            url: NEWS_API_URL.to_string(),
        })
    }

    /// Reads `NEWS_API_KEY`; an unset key yields a provider that never calls out.
    pub fn from_env() -> Result<Self> {
        Self::new(std::env::var("NEWS_API_KEY").unwrap_or_default())
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn has_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn parse_response(body: &str) -> Result<CorroborationSignal> {
        let resp: Resp = serde_json::from_str(body).context("parsing newsapi response")?;
        let buzz = (resp.articles.len() as f64 * BUZZ_PER_ARTICLE).min(1.0);
        let headlines = resp
            .articles
            .into_iter()
            .filter_map(|a| a.title)
            .take(MAX_HEADLINES)
            .collect();
        Ok(CorroborationSignal {
            buzz_score: buzz,
            headlines,
            source: Some("NewsAPI".to_string()),
        })
    }
}

#[async_trait]
impl ExternalCorroborationProvider for NewsApiCorroboration {
    async fn get(&self, region: &str) -> Result<CorroborationSignal> {
        if !self.has_key() {
            return Ok(CorroborationSignal {
                buzz_score: 0.0,
                headlines: Vec::new(),
                source: None,
            });
        }

        let query = format!("{region} AND (flood OR rain OR disaster)");
        let resp = self
            .http
            .get(&self.url)
            .query(&[
                ("q", query.as_str()),
                ("sortBy", "publishedAt"),
                ("language", "en"),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, provider = "NewsAPI", "provider http error");
                counter!("provider_errors_total", "provider" => "newsapi").increment(1);
                return Err(e).context("newsapi get()");
            }
        };
        let body = resp.text().await.context("newsapi .text()")?;
        Self::parse_response(&body)
    }

    fn name(&self) -> &'static str {
        "NewsAPI"
    }
}
