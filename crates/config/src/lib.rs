//! Configuration loading, validation, env substitution, and env overrides.
//!
//! Config files: `scrapegate.toml`, `scrapegate.yaml`, or `scrapegate.json`
//! Searched in `./` then `~/.config/scrapegate/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values. The service
//! environment variables (`SERVICE_API_KEY`, `BROWSER_HEADLESS`,
//! `DEFAULT_TIMEOUT`, `PORT`) are applied on top of the file.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{ConfigError, Result},
    loader::{
        apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config,
        load_from,
    },
    schema::{
        AuthConfig, BrowserConfig, MAX_PAGE_TIMEOUT_MS, ScrapeConfig, ScrapegateConfig,
        ServerConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
