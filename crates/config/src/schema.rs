/// Config schema types (server, auth, browser, scrape).
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapegateConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub browser: BrowserConfig,
    pub scrape: ScrapeConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "0.0.0.0".
    pub bind: String,
    /// Port to listen on. Defaults to 8000.
    pub port: u16,
    /// Answer CORS preflights for any origin, method and header.
    pub cors_allow_any: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8000,
            cors_allow_any: true,
        }
    }
}

/// Bearer-token authentication for `/scrape`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret expected in `Authorization: Bearer <api_key>`.
    /// When unset every scrape request is rejected.
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
}

/// Upper bound for any page operation timeout, whether configured or sent
/// with a request.
pub const MAX_PAGE_TIMEOUT_MS: u64 = 300_000;

/// Headless browser configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run Chromium without a window.
    pub headless: bool,
    /// Path to Chrome/Chromium binary (auto-detected if not set).
    pub chrome_path: Option<String>,
    /// Additional Chrome arguments, appended after the built-in flags.
    pub chrome_args: Vec<String>,
    /// Default page operation timeout in milliseconds, at most
    /// [`MAX_PAGE_TIMEOUT_MS`].
    pub default_timeout_ms: u64,
    /// Launch the browser while the server starts instead of on first use.
    pub launch_on_startup: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            chrome_args: Vec::new(),
            default_timeout_ms: 30_000,
            launch_on_startup: true,
        }
    }
}

/// Scrape admission control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Maximum number of scrapes running at once (0 = unbounded).
    pub max_concurrent: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self { max_concurrent: 8 }
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
