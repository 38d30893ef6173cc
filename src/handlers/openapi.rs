use axum::Json;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::models::{ErrorDto, WeatherDto};
use crate::rate_limit::API_KEY_HEADER;

#[derive(OpenApi)]
#[openapi(
    info(title = "Weather API", description = "Current weather descriptions by city and country"),
    paths(super::weather::weather_handler),
    components(schemas(WeatherDto, ErrorDto)),
    modifiers(&ApiKeySecurity)
)]
pub struct ApiDoc;

// Declares the X-API-Key header scheme referenced by the weather route
struct ApiKeySecurity;

impl Modify for ApiKeySecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            API_KEY_HEADER,
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
        );
    }
}

pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
