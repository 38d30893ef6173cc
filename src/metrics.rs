use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, TextEncoder, register_counter, register_histogram};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("weather_requests_total", "Total number of weather requests").unwrap();
    pub static ref RATE_LIMITED: Counter =
        register_counter!("weather_rate_limited_total", "Requests rejected by the quota").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("weather_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("weather_cache_misses_total", "Total cache misses").unwrap();
    pub static ref UPSTREAM_ERRORS: Counter =
        register_counter!("weather_upstream_errors_total", "Failed OpenWeatherMap calls").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "weather_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
}

// Render every registered metric in the Prometheus text format
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}
