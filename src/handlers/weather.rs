use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use std::sync::Arc;
use std::time::Instant;

use crate::error::AppError;
use crate::metrics::REQUEST_LATENCY;
use crate::models::{ErrorDto, WeatherDto, WeatherQuery};
use crate::state::AppState;

// Uppercase the first character of every space separated word, leave the rest alone
pub fn capitalize_words(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut at_word_start = true;
    for ch in input.chars() {
        if ch.is_whitespace() {
            at_word_start = true;
            out.push(ch);
        } else if at_word_start {
            at_word_start = false;
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[utoipa::path(
    get,
    path = "/api/weather",
    tag = "weather",
    params(WeatherQuery),
    security(("X-API-Key" = [])),
    responses(
        (status = 200, description = "Successful response", body = WeatherDto),
        (status = 400, description = "Missing or invalid query parameters", body = ErrorDto),
        (status = 401, description = "Unauthorized", body = ErrorDto),
        (status = 404, description = "City not found", body = ErrorDto),
        (status = 429, description = "Too many requests", body = ErrorDto),
        (status = 500, description = "Server internal error", body = ErrorDto),
    )
)]
pub async fn weather_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<WeatherQuery>, QueryRejection>,
) -> Result<Json<WeatherDto>, AppError> {
    let Query(query) = query.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let start_time = Instant::now();

    let city = capitalize_words(&query.city);
    let country = capitalize_words(&query.country);
    let result = state
        .weather
        .get_weather(&city, &country, chrono::Utc::now())
        .await;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    result.map(Json)
}
