use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;

use crate::config::OpenWeatherConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("Could not find city {0}")]
    NotFound(String),
    #[error("{0}")]
    Upstream(String),
}

// One weather condition as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Condition {
    pub description: String,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current conditions for the pair, in the order the provider reports them.
    async fn fetch(&self, city: &str, country: &str) -> Result<Vec<Condition>, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    weather: Vec<Condition>,
}

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    config: OpenWeatherConfig,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(config: OpenWeatherConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Upstream(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn fetch(&self, city: &str, country: &str) -> Result<Vec<Condition>, ProviderError> {
        tracing::info!(city, country, "Retrieving weather data from OpenWeatherMap");

        let query = [city, country].join(",");
        let res = self
            .http
            .get(&self.config.base_url)
            .header(header::ACCEPT, "application/json")
            .query(&[
                ("q", query.as_str()),
                ("appid", self.config.api_key.as_str()),
                ("units", self.config.units.as_str()),
            ])
            .send()
            .await
            .map_err(|e| upstream_failure(&e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| upstream_failure(&e))?;

        if status == StatusCode::NOT_FOUND {
            tracing::warn!(city, country, "OpenWeatherMap does not know this city");
            return Err(ProviderError::NotFound(city.to_string()));
        }

        if !status.is_success() {
            tracing::error!(%status, "OpenWeatherMap request failed");
            return Err(ProviderError::Upstream(format!(
                "{}: {}",
                status,
                truncate_body(&body)
            )));
        }

        let parsed: OwCurrentResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::Upstream(format!("Failed to parse OpenWeatherMap response: {e}"))
        })?;

        Ok(parsed.weather)
    }
}

fn upstream_failure(err: &reqwest::Error) -> ProviderError {
    let message = if err.is_timeout() {
        format!("OpenWeatherMap request timed out: {err}")
    } else {
        format!("OpenWeatherMap request failed: {err}")
    };
    tracing::error!("{message}");
    ProviderError::Upstream(message)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
