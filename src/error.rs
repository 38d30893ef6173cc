use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::ErrorDto;
use crate::provider::ProviderError;
use crate::store::StoreError;

/// Every failure a request can end in. Each variant maps to one HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid API Key")]
    InvalidCredential,

    #[error("Maximum {max_requests} requests per {window_minutes} minutes")]
    QuotaExceeded {
        max_requests: u32,
        window_minutes: u32,
    },

    #[error("Could not find city {0}")]
    CityNotFound(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unexpected(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredential => StatusCode::UNAUTHORIZED,
            AppError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::CityNotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(city) => AppError::CityNotFound(city),
            ProviderError::Upstream(message) => AppError::Upstream(message),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Unexpected(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, "{error_message}");
        } else {
            tracing::warn!(status = %status, "{error_message}");
        }

        (status, Json(ErrorDto { error_message })).into_response()
    }
}
