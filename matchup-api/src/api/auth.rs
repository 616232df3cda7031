//! Caller identity middleware
//!
//! Identity is provided by an external collaborator: the fronting gateway
//! authenticates the caller and installs a trusted `X-User-Id` header.
//! This middleware resolves it into a typed [`UserId`] extension for
//! handlers; requests without a parseable id are rejected with 401.
//!
//! Applied to protected routes only; `/health` stays open.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use matchup_common::Error;
use uuid::Uuid;

use super::ApiError;

/// Header carrying the authenticated caller's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, available to handlers as an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

/// Resolve the caller identity or reject the request.
pub async fn require_identity(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::Unauthenticated("Missing caller identity".to_string()))?;

    let user_id = Uuid::parse_str(header)
        .map_err(|_| Error::Unauthenticated("Malformed caller identity".to_string()))?;

    request.extensions_mut().insert(UserId(user_id));
    Ok(next.run(request).await)
}
