use std::{sync::Arc, time::Duration};

use {
    scrapegate_browser::BrowserManager,
    scrapegate_config::ScrapegateConfig,
    scrapegate_scrape::ExtractionPipeline,
    secrecy::Secret,
};

use crate::service::ScrapeService;

/// Shared application state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ScrapeService>,
    pub browser: Arc<BrowserManager>,
    pub api_key: Option<Secret<String>>,
    pub headless: bool,
    pub cors_allow_any: bool,
    pub version: &'static str,
}

impl AppState {
    pub fn new(config: &ScrapegateConfig, browser: Arc<BrowserManager>) -> Self {
        let pipeline =
            ExtractionPipeline::new(Duration::from_millis(config.browser.default_timeout_ms));
        let service = ScrapeService::new(
            Arc::clone(&browser),
            pipeline,
            config.scrape.max_concurrent,
        );
        Self {
            service: Arc::new(service),
            browser,
            api_key: config.auth.api_key.clone(),
            headless: config.browser.headless,
            cors_allow_any: config.server.cors_allow_any,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
