use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use concierge_booking::CartError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    pub fn session_not_found(id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("Session not found: {}", id))
    }

    pub fn from_cart(err: CartError) -> Self {
        match err {
            CartError::NotFound(_) => AppError::NotFound(err.to_string()),
            CartError::InvalidTransition { .. } | CartError::PreconditionViolation(_) => {
                AppError::Conflict(err.to_string())
            }
            CartError::LegNotRequired { .. } => AppError::BadRequest(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
