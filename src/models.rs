use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// Caller identity, resolved from the X-API-Key header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub api_key: String,
    pub enabled: bool,
}

// Stored weather description for a city/country pair at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherSnapshot {
    pub city: String,
    pub country: String,
    pub description: String,
    pub updated_on: DateTime<Utc>,
}

// One accepted call by a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLogEntry {
    pub user_id: i64,
    pub requested_on: DateTime<Utc>,
}

// Query string of GET /api/weather
#[derive(Deserialize, Debug, Clone, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WeatherQuery {
    /// The name of the city, e.g. Melbourne
    pub city: String,
    /// The full name of the country, e.g. Australia
    pub country: String,
}

// Successful response body
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct WeatherDto {
    #[schema(example = "Melbourne")]
    pub city: String,
    #[schema(example = "Australia")]
    pub country: String,
    /// The weather description
    #[schema(example = "Cloudy")]
    pub description: String,
}

// Error response body
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDto {
    #[schema(example = "Could not find city Whitehorse")]
    pub error_message: String,
}
