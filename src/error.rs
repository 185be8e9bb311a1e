use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::trip::TripStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("trip already finalized as {0}")]
    AlreadyFinalized(TripStatus),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: TripStatus, to: TripStatus },

    #[error("no drivers available")]
    NoDriverAvailable,

    #[error("routing unavailable: {0}")]
    RoutingUnavailable(String),

    #[error("driver was claimed by another trip")]
    ConcurrentAssignmentConflict,

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyFinalized(_)
            | AppError::InvalidTransition { .. }
            | AppError::ConcurrentAssignmentConflict => StatusCode::CONFLICT,
            AppError::NoDriverAvailable | AppError::RoutingUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
