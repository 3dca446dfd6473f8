//! Gateway: the HTTP surface of the scraping service.
//!
//! Lifecycle:
//! 1. Load config, build the shared `BrowserManager`
//! 2. Optionally launch the browser eagerly
//! 3. Bind and serve `/`, `/health` and the authenticated `/scrape`
//! 4. On SIGINT/SIGTERM drain connections, then close the browser

pub mod auth_middleware;
pub mod error;
pub mod server;
pub mod service;
pub mod state;

pub use {
    error::GatewayError,
    server::{ScrapeResponse, build_app, serve, start_server},
    service::ScrapeService,
    state::AppState,
};
