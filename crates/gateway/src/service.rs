//! Admission-controlled scrape execution.

use std::sync::Arc;

use {
    scrapegate_browser::BrowserManager,
    scrapegate_scrape::{ExtractionPipeline, ScrapeOutput, ScrapeRequest},
    tokio::sync::Semaphore,
    tracing::{debug, warn},
};

use crate::error::GatewayError;

/// Runs validated requests through the extraction pipeline on the shared
/// browser.
///
/// At most `max_concurrent` scrapes hold a browsing context at once; the rest
/// wait for a permit. Each scrape runs in its own task, so a caller that goes
/// away mid-request does not interrupt it and its context is still closed.
pub struct ScrapeService {
    browser: Arc<BrowserManager>,
    pipeline: Arc<ExtractionPipeline>,
    permits: Option<Arc<Semaphore>>,
    max_concurrent: usize,
}

impl ScrapeService {
    /// `max_concurrent == 0` disables admission control.
    pub fn new(
        browser: Arc<BrowserManager>,
        pipeline: ExtractionPipeline,
        max_concurrent: usize,
    ) -> Self {
        let permits = (max_concurrent > 0).then(|| Arc::new(Semaphore::new(max_concurrent)));
        Self {
            browser,
            pipeline: Arc::new(pipeline),
            permits,
            max_concurrent,
        }
    }

    /// Configured concurrency limit, `0` when unbounded.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub async fn scrape(&self, request: ScrapeRequest) -> Result<ScrapeOutput, GatewayError> {
        let request = request
            .validated()
            .map_err(|e| GatewayError::Validation(e.to_string()))?;

        let permit = match &self.permits {
            Some(permits) => Some(
                Arc::clone(permits)
                    .acquire_owned()
                    .await
                    .map_err(|_| GatewayError::Internal("scrape queue closed".into()))?,
            ),
            None => None,
        };

        let browser = Arc::clone(&self.browser);
        let pipeline = Arc::clone(&self.pipeline);
        let task = tokio::spawn(async move {
            let _permit = permit;
            let engine = browser.acquire().await?;
            debug!(url = %request.url, "running scrape");
            pipeline
                .run(engine.as_ref(), &request)
                .await
                .map_err(GatewayError::from)
        });

        task.await.map_err(|e| {
            warn!(error = %e, "scrape task did not complete");
            GatewayError::Internal(e.to_string())
        })?
    }
}
