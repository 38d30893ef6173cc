use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

pub const DEFAULT_OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "weather-gateway")]
#[command(about = "Rate limited, caching weather API in front of OpenWeatherMap")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "WEATHER_PORT", default_value_t = 8080)]
    pub port: u16,

    // SQLite database file; in-memory store when absent
    #[arg(short, long, env = "WEATHER_DATABASE")]
    pub database: Option<PathBuf>,

    // API keys to provision as enabled users on startup
    // Example: "123456789,987654321"
    #[arg(long = "api-key", env = "WEATHER_API_KEYS", value_delimiter = ',')]
    pub api_keys: Vec<String>,

    // Rate limit max requests per window
    #[arg(long, env = "WEATHER_RATE_LIMIT", default_value_t = 5)]
    pub rate_limit: u32,

    // Rate limit window in minutes
    #[arg(long, env = "WEATHER_RATE_WINDOW", default_value_t = 2)]
    pub rate_window: u32,

    // How long a stored weather description stays fresh, in minutes
    #[arg(short, long, env = "WEATHER_CACHE_FRESHNESS", default_value_t = 30)]
    pub cache_freshness: u32,

    #[arg(long, env = "OPENWEATHER_URL", default_value = DEFAULT_OPENWEATHER_URL)]
    pub openweather_url: String,

    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    pub openweather_api_key: String,

    // Unit preference forwarded to the provider: standard, metric or imperial
    #[arg(long, env = "OPENWEATHER_UNITS", default_value = "metric")]
    pub openweather_units: String,

    // Timeout for a single upstream call
    #[arg(long, env = "WEATHER_UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_timeout_secs: u64,
}

/// Sliding window quota applied per API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_minutes: u32,
}

impl RateLimitConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.window_minutes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub freshness_minutes: u32,
}

impl CacheConfig {
    pub fn freshness(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.freshness_minutes))
    }
}

#[derive(Debug, Clone)]
pub struct OpenWeatherConfig {
    pub base_url: String,
    pub api_key: String,
    pub units: String,
    pub timeout: Duration,
}

impl Args {
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.rate_limit,
            window_minutes: self.rate_window,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            freshness_minutes: self.cache_freshness,
        }
    }

    pub fn openweather_config(&self) -> OpenWeatherConfig {
        OpenWeatherConfig {
            base_url: self.openweather_url.clone(),
            api_key: self.openweather_api_key.clone(),
            units: self.openweather_units.clone(),
            timeout: Duration::from_secs(self.upstream_timeout_secs),
        }
    }
}
