use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::CacheConfig;
use crate::error::AppError;
use crate::metrics::{CACHE_HITS, CACHE_MISSES, UPSTREAM_ERRORS};
use crate::models::{WeatherDto, WeatherSnapshot};
use crate::provider::{Condition, WeatherProvider};
use crate::store::RecordStore;

/// Serves weather descriptions from the record store and refreshes them
/// from the provider once they are older than the freshness window.
#[derive(Clone)]
pub struct WeatherCache {
    store: Arc<dyn RecordStore>,
    provider: Arc<dyn WeatherProvider>,
    config: CacheConfig,
}

impl WeatherCache {
    pub fn new(
        store: Arc<dyn RecordStore>,
        provider: Arc<dyn WeatherProvider>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    pub async fn get_weather(
        &self,
        city: &str,
        country: &str,
        now: DateTime<Utc>,
    ) -> Result<WeatherDto, AppError> {
        tracing::info!(city, country, "Getting weather");

        let valid_from = now - self.config.freshness();
        let snapshot = match self.store.find_latest_snapshot(city, country).await? {
            Some(snapshot) if snapshot.updated_on >= valid_from => {
                CACHE_HITS.inc();
                tracing::debug!(city, country, updated_on = %snapshot.updated_on, "Cache HIT");
                snapshot
            }
            _ => {
                CACHE_MISSES.inc();
                self.refresh(city, country, now).await?
            }
        };

        Ok(WeatherDto {
            city: city.to_string(),
            country: country.to_string(),
            description: snapshot.description,
        })
    }

    async fn refresh(
        &self,
        city: &str,
        country: &str,
        now: DateTime<Utc>,
    ) -> Result<WeatherSnapshot, AppError> {
        tracing::info!(city, country, "Refreshing weather");

        let conditions = self.provider.fetch(city, country).await.inspect_err(|_| {
            UPSTREAM_ERRORS.inc();
        })?;

        let snapshot = WeatherSnapshot {
            city: city.to_string(),
            country: country.to_string(),
            description: join_descriptions(&conditions),
            updated_on: now,
        };
        self.store.save_snapshot(&snapshot).await?;
        Ok(snapshot)
    }
}

// Multiple concurrent conditions are joined by a bare comma
pub fn join_descriptions(conditions: &[Condition]) -> String {
    conditions
        .iter()
        .map(|c| c.description.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
