//! Engine seams: the shared browser, its isolated contexts and their pages.
//!
//! The Chromium implementation lives in [`crate::chromium`]; tests use the
//! in-memory engine from `testing`.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    error::BrowserError,
    types::{BrowserConfig, ContextOptions},
};

/// A running browser process shared by every request.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Whether the process and its control connection are still alive.
    fn is_connected(&self) -> bool;

    /// Open a new isolated browsing context (own cookies and storage).
    async fn new_context(
        &self,
        options: &ContextOptions,
    ) -> Result<Box<dyn BrowsingContext>, BrowserError>;

    /// Terminate the browser process.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// One isolated browsing context. Closing consumes it, so it can only be
/// closed once.
#[async_trait]
pub trait BrowsingContext: Send + Sync {
    fn id(&self) -> &str;

    /// Open a page whose operations are bounded by `default_timeout`.
    async fn new_page(&self, default_timeout: Duration)
    -> Result<Box<dyn PageDriver>, BrowserError>;

    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

/// Operations the extraction pipeline runs against a page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait until the network is idle. Returns the HTTP status
    /// of the navigation response, if there was one.
    async fn goto(&self, url: &str) -> Result<Option<u16>, BrowserError>;

    /// Wait until `selector` matches an element, up to `timeout`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
    -> Result<(), BrowserError>;

    /// Serialized markup of the whole document.
    async fn content(&self) -> Result<String, BrowserError>;

    /// Evaluate an expression and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// Full-page PNG screenshot.
    async fn screenshot_full_page(&self) -> Result<Vec<u8>, BrowserError>;
}

/// Starts browser engines. Swapped out in tests.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, config: &BrowserConfig) -> Result<Arc<dyn BrowserEngine>, BrowserError>;
}
