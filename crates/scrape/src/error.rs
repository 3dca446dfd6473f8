use thiserror::Error;

/// A request rejected before any browser work.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported url scheme: {0} (expected http or https)")]
    UnsupportedScheme(String),

    #[error("wait_for_timeout must be a positive number of milliseconds")]
    ZeroTimeout,

    #[error("wait_for_timeout must not exceed {max_ms} milliseconds")]
    TimeoutTooLarge { max_ms: u64 },
}

/// A failure while rendering or extracting a page.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Opening the page or navigating to it failed.
    #[error("{0}")]
    Navigation(String),

    #[error("timeout {timeout_ms}ms exceeded waiting for selector \"{selector}\"")]
    SelectorTimeout { selector: String, timeout_ms: u64 },

    /// An extraction step failed on the loaded page.
    #[error("{0}")]
    Extraction(String),
}

impl ScrapeError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Navigation(_) => "navigation",
            Self::SelectorTimeout { .. } => "selector_timeout",
            Self::Extraction(_) => "extraction",
        }
    }
}
