use {
    axum::{
        http::{StatusCode, header},
        response::{IntoResponse, Json, Response},
    },
    scrapegate_browser::BrowserError,
    scrapegate_scrape::ScrapeError,
    serde_json::json,
    thiserror::Error,
};

/// Every way a request can fail, mapped to a status at the HTTP boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Browser(BrowserError::LaunchFailed(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Browser(_) | Self::Scrape(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Unauthorized(detail) => (
                status,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                Json(json!({ "detail": detail })),
            )
                .into_response(),
            Self::Validation(detail) | Self::Internal(detail) => {
                (status, Json(json!({ "detail": detail }))).into_response()
            },
            Self::Browser(BrowserError::LaunchFailed(message)) => (
                status,
                Json(json!({ "detail": format!("Browser unavailable: {message}") })),
            )
                .into_response(),
            Self::Browser(e) => (
                status,
                Json(json!({ "detail": format!("Scraping failed: {e}"), "kind": "navigation" })),
            )
                .into_response(),
            Self::Scrape(e) => (
                status,
                Json(json!({ "detail": format!("Scraping failed: {e}"), "kind": e.kind() })),
            )
                .into_response(),
        }
    }
}
