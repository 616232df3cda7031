//! HTTP API handlers for matchup-api

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use matchup_common::Error;
use serde_json::json;
use tracing::error;

pub mod auth;
pub mod competition;
pub mod health;
pub mod rating;

/// Wrapper mapping engine errors onto HTTP status codes. Every failure is
/// surfaced as a distinct code with a JSON `{error}` body; infrastructure
/// errors are logged and collapsed to 500.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidChoice(_) => StatusCode::BAD_REQUEST,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
                error!("Request failed: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
