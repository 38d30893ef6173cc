mod health;
mod metrics;
mod openapi;
mod weather;

use std::sync::Arc;

use axum::{Router, middleware, routing::get};

use crate::rate_limit;
use crate::state::AppState;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use openapi::openapi_handler;
pub use weather::weather_handler;

// Only the weather route sits behind the quota
pub fn router(state: Arc<AppState>) -> Router {
    let weather = Router::new()
        .route("/api/weather", get(weather_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            rate_limit::enforce,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api-docs/openapi.json", get(openapi_handler))
        .merge(weather)
        .with_state(state)
}
