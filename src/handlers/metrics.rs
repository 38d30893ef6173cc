use crate::error::AppError;

pub async fn metrics_handler() -> Result<String, AppError> {
    crate::metrics::render().map_err(AppError::Unexpected)
}
