//! Launch settings, per-context options and the shared handle state.

use std::{fmt, time::Duration};

pub use scrapegate_config::MAX_PAGE_TIMEOUT_MS;

/// Flags every launch carries so Chromium runs inside containers and
/// unprivileged hosts.
pub const LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--disable-gpu",
];

/// Longest timeout a page operation may be given.
pub const MAX_PAGE_TIMEOUT: Duration = Duration::from_millis(MAX_PAGE_TIMEOUT_MS);

pub const VIEWPORT_WIDTH: u32 = 1920;
pub const VIEWPORT_HEIGHT: u32 = 1080;

/// Desktop Chrome user agent presented by every browsing context.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Browser process configuration.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run without a visible window.
    pub headless: bool,
    /// Path to Chrome/Chromium binary (auto-detected if not set).
    pub chrome_path: Option<String>,
    /// Extra arguments appended after [`LAUNCH_ARGS`].
    pub chrome_args: Vec<String>,
    /// Default page operation timeout.
    pub request_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            chrome_args: Vec::new(),
            request_timeout: Duration::from_millis(30_000),
        }
    }
}

impl From<&scrapegate_config::BrowserConfig> for BrowserConfig {
    fn from(cfg: &scrapegate_config::BrowserConfig) -> Self {
        Self {
            headless: cfg.headless,
            chrome_path: cfg.chrome_path.clone(),
            chrome_args: cfg.chrome_args.clone(),
            request_timeout: Duration::from_millis(cfg.default_timeout_ms),
        }
    }
}

impl BrowserConfig {
    /// Full argument list handed to the browser process.
    pub fn launch_args(&self) -> Vec<String> {
        LAUNCH_ARGS
            .iter()
            .map(|a| (*a).to_string())
            .chain(self.chrome_args.iter().cloned())
            .collect()
    }

    /// Timeout handed to the CDP connection at launch.
    ///
    /// chromiumoxide applies it to every command and navigation on every
    /// page, so it must not undercut a per-page timeout. Pages enforce their
    /// own limit on top of it.
    pub fn cdp_request_timeout(&self) -> Duration {
        self.request_timeout.max(MAX_PAGE_TIMEOUT)
    }
}

/// Settings applied to every isolated browsing context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOptions {
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: String,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            viewport_width: VIEWPORT_WIDTH,
            viewport_height: VIEWPORT_HEIGHT,
            user_agent: DESKTOP_USER_AGENT.to_string(),
        }
    }
}

/// Lifecycle of the shared browser handle.
///
/// `Uninitialized`/`Disconnected` move to `Launching` on acquire, then to
/// `Ready`. A failed launch restores the state held before `Launching`.
/// `Ready` becomes `Disconnected` once the engine is seen to be gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserState {
    #[default]
    Uninitialized,
    Launching,
    Ready,
    Disconnected,
}

impl BrowserState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Launching => "launching",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for BrowserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
