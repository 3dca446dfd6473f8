use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use {
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
};

use crate::{error::GatewayError, state::AppState};

/// Middleware that protects routes behind the configured bearer token.
///
/// Runs before the body is read, so a rejected request never reaches JSON
/// parsing or the browser. With no token configured every request is
/// rejected.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    match check_bearer(request.headers(), state.api_key.as_ref()) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            debug!(path = %request.uri().path(), reason = %e, "rejected request");
            e.into_response()
        },
    }
}

/// Validate an `Authorization: Bearer <token>` header against `expected`.
pub fn check_bearer(
    headers: &HeaderMap,
    expected: Option<&Secret<String>>,
) -> Result<(), GatewayError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err(GatewayError::Unauthorized("Missing authorization header"));
    };
    let Some(token) = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
    else {
        return Err(GatewayError::Unauthorized("Invalid authorization format"));
    };
    match expected {
        Some(key) if constant_time_eq(token.as_bytes(), key.expose_secret().as_bytes()) => Ok(()),
        _ => Err(GatewayError::Unauthorized("Invalid API key")),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
