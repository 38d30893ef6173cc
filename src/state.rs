use std::sync::Arc;

use crate::cache::WeatherCache;
use crate::config::{CacheConfig, RateLimitConfig};
use crate::provider::WeatherProvider;
use crate::rate_limit::RateLimiter;
use crate::store::RecordStore;

// app's shared state; all durable state lives in the store
pub struct AppState {
    pub rate_limiter: RateLimiter,
    pub weather: WeatherCache,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        provider: Arc<dyn WeatherProvider>,
        rate_limit: RateLimitConfig,
        cache: CacheConfig,
    ) -> Self {
        Self {
            rate_limiter: RateLimiter::new(Arc::clone(&store), rate_limit),
            weather: WeatherCache::new(store, provider, cache),
        }
    }
}
