//! Per-request rendering and extraction.

use std::time::{Duration, Instant};

use {
    scrapegate_browser::{BrowserEngine, BrowserError, BrowsingContext, ContextOptions, PageDriver},
    serde::de::DeserializeOwned,
    tracing::{debug, info, warn},
};

use crate::{
    error::ScrapeError,
    extract::{self, RawImage, RawLink, RawMetadata},
    scripts,
    types::{Format, PageMetadata, ScrapeOutput, ScrapeRequest, ScrapeResult},
};

/// Upper bound on `wait_for_selector`, independent of the page timeout.
pub const SELECTOR_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Runs one scrape in a fresh browsing context.
///
/// The context is closed exactly once before [`run`](Self::run) returns,
/// whatever the outcome.
#[derive(Debug, Clone)]
pub struct ExtractionPipeline {
    default_timeout: Duration,
    context_options: ContextOptions,
}

impl ExtractionPipeline {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            default_timeout,
            context_options: ContextOptions::default(),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub async fn run(
        &self,
        engine: &dyn BrowserEngine,
        request: &ScrapeRequest,
    ) -> Result<ScrapeOutput, ScrapeError> {
        let started = Instant::now();
        let context = engine
            .new_context(&self.context_options)
            .await
            .map_err(navigation)?;
        let context_id = context.id().to_string();
        debug!(context = %context_id, url = %request.url, "opened browsing context");

        let outcome = self.drive(context.as_ref(), request).await;

        if let Err(e) = context.close().await {
            warn!(context = %context_id, error = %e, "failed to close browsing context");
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(output) => info!(
                url = %request.url,
                status = ?output.data.status,
                elapsed_ms,
                "scrape complete"
            ),
            Err(e) => warn!(
                url = %request.url,
                kind = e.kind(),
                error = %e,
                elapsed_ms,
                "scrape failed"
            ),
        }
        outcome
    }

    async fn drive(
        &self,
        context: &dyn BrowsingContext,
        request: &ScrapeRequest,
    ) -> Result<ScrapeOutput, ScrapeError> {
        let timeout = request
            .wait_for_timeout
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);
        let page = context.new_page(timeout).await.map_err(navigation)?;

        let status = page.goto(&request.url).await.map_err(navigation)?;
        debug!(url = %request.url, ?status, "page loaded");

        if let Some(ref selector) = request.wait_for_selector {
            page.wait_for_selector(selector, SELECTOR_TIMEOUT)
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        ScrapeError::SelectorTimeout {
                            selector: selector.clone(),
                            timeout_ms: SELECTOR_TIMEOUT.as_millis() as u64,
                        }
                    } else {
                        extraction(e)
                    }
                })?;
        }

        let mut data = ScrapeResult::new(request.url.clone(), status);

        if request.wants(Format::Html) {
            data.html = Some(page.content().await.map_err(extraction)?);
        }

        if request.wants_text() {
            let text: String = evaluate(page.as_ref(), scripts::VISIBLE_TEXT).await?;
            data.markdown = Some(text.clone());
            data.text = Some(text);
        }

        if request.extract_links {
            let raw: Vec<RawLink> = evaluate(page.as_ref(), scripts::LINKS).await?;
            data.links = Some(extract::links(raw));
        }

        if request.extract_images {
            let raw: Vec<RawImage> = evaluate(page.as_ref(), scripts::IMAGES).await?;
            data.images = Some(extract::images(raw));
        }

        if request.screenshot {
            let png = page.screenshot_full_page().await.map_err(extraction)?;
            data.screenshot = Some(hex::encode(png));
        }

        let raw: RawMetadata = evaluate(page.as_ref(), scripts::METADATA).await?;
        let metadata = PageMetadata::from(raw);

        Ok(ScrapeOutput { data, metadata })
    }
}

async fn evaluate<T: DeserializeOwned>(
    page: &dyn PageDriver,
    script: &str,
) -> Result<T, ScrapeError> {
    let value = page.evaluate(script).await.map_err(extraction)?;
    serde_json::from_value(value)
        .map_err(|e| ScrapeError::Extraction(format!("unexpected page script result: {e}")))
}

fn navigation(err: BrowserError) -> ScrapeError {
    ScrapeError::Navigation(err.to_string())
}

fn extraction(err: BrowserError) -> ScrapeError {
    ScrapeError::Extraction(err.to_string())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::SiteFixture,
        scrapegate_browser::{BrowserConfig, Launcher, testing::FakeLauncher},
        std::{collections::BTreeSet, sync::Arc},
    };

    const TWO_ANCHORS: &str = "<html><head><title>Two anchors</title></head><body>\
        <a href=\"/first\"> First </a><a href=\"https://other.test/second\">Second</a>\
        </body></html>";

    fn two_anchor_site() -> SiteFixture {
        SiteFixture::new(TWO_ANCHORS)
            .title("Two anchors")
            .text("First Second")
            .link(" First ", "https://site.test/first")
            .link("Second", "https://other.test/second")
    }

    async fn engine(launcher: &FakeLauncher) -> Arc<dyn BrowserEngine> {
        launcher.launch(&BrowserConfig::default()).await.unwrap()
    }

    fn pipeline() -> ExtractionPipeline {
        ExtractionPipeline::new(Duration::from_millis(30_000))
    }

    #[tokio::test]
    async fn html_and_links_from_two_anchor_page() {
        let launcher = FakeLauncher::new().with_page("https://site.test/", two_anchor_site().into_page());
        let engine = engine(&launcher).await;

        let mut request = ScrapeRequest::new("https://site.test/");
        request.formats = BTreeSet::from([Format::Html]);
        request.extract_links = true;

        let out = pipeline().run(engine.as_ref(), &request).await.unwrap();
        assert_eq!(out.data.status, Some(200));
        assert_eq!(out.data.html.as_deref(), Some(TWO_ANCHORS));
        assert!(out.data.text.is_none() && out.data.markdown.is_none());
        let links = out.data.links.unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].text, "First");
        assert_eq!(links[0].href, "https://site.test/first");
        assert_eq!(links[1].href, "https://other.test/second");
        assert_eq!(out.metadata.title, "Two anchors");
        assert_eq!(launcher.stats().contexts_closed(), 1);
    }

    #[tokio::test]
    async fn text_and_markdown_are_identical() {
        let launcher = FakeLauncher::new().with_page("https://site.test/", two_anchor_site().into_page());
        let engine = engine(&launcher).await;

        for formats in [
            BTreeSet::from([Format::Text]),
            BTreeSet::from([Format::Markdown]),
            BTreeSet::from([Format::Text, Format::Markdown, Format::Html]),
        ] {
            let mut request = ScrapeRequest::new("https://site.test/");
            request.formats = formats;
            let out = pipeline().run(engine.as_ref(), &request).await.unwrap();
            assert_eq!(out.data.text.as_deref(), Some("First Second"));
            assert_eq!(out.data.text, out.data.markdown);
        }
    }

    #[tokio::test]
    async fn metadata_always_computed() {
        let site = two_anchor_site()
            .meta_name("description", "A page")
            .meta_property("og:title", "OG anchors");
        let launcher = FakeLauncher::new().with_page("https://site.test/", site.into_page());
        let engine = engine(&launcher).await;

        let mut request = ScrapeRequest::new("https://site.test/");
        request.formats = BTreeSet::new();

        let out = pipeline().run(engine.as_ref(), &request).await.unwrap();
        assert!(out.data.html.is_none() && out.data.links.is_none());
        assert_eq!(out.metadata.title, "Two anchors");
        assert_eq!(out.metadata.og_title.as_deref(), Some("OG anchors"));
        assert_eq!(
            out.metadata.meta.get("description").map(String::as_str),
            Some("A page")
        );
    }

    #[tokio::test]
    async fn images_and_screenshot() {
        let site = two_anchor_site()
            .image("https://site.test/a.png", Some("A"))
            .image("https://site.test/b.png", None)
            .screenshot(vec![0x89, 0x50, 0x4e, 0x47]);
        let launcher = FakeLauncher::new().with_page("https://site.test/", site.into_page());
        let engine = engine(&launcher).await;

        let mut request = ScrapeRequest::new("https://site.test/");
        request.extract_images = true;
        request.screenshot = true;

        let out = pipeline().run(engine.as_ref(), &request).await.unwrap();
        let images = out.data.images.unwrap();
        assert_eq!(images[0].alt, "A");
        assert_eq!(images[1].alt, "");
        assert_eq!(out.data.screenshot.as_deref(), Some("89504e47"));
    }

    #[tokio::test]
    async fn context_uses_desktop_viewport_and_request_timeout() {
        let launcher = FakeLauncher::new().with_page("https://site.test/", two_anchor_site().into_page());
        let engine = engine(&launcher).await;

        let mut request = ScrapeRequest::new("https://site.test/");
        pipeline().run(engine.as_ref(), &request).await.unwrap();
        request.wait_for_timeout = Some(1234);
        pipeline().run(engine.as_ref(), &request).await.unwrap();

        let stats = launcher.stats();
        assert_eq!(stats.context_options()[0], ContextOptions::default());
        assert_eq!(
            stats.page_timeouts(),
            vec![Duration::from_millis(30_000), Duration::from_millis(1234)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn request_timeout_can_exceed_service_default() {
        let slow = two_anchor_site()
            .into_page()
            .navigation_delay(Duration::from_secs(45));
        let launcher = FakeLauncher::new().with_page("https://site.test/", slow);
        let engine = engine(&launcher).await;

        let mut request = ScrapeRequest::new("https://site.test/");
        let err = pipeline().run(engine.as_ref(), &request).await.unwrap_err();
        assert_eq!(err.kind(), "navigation");

        request.wait_for_timeout = Some(60_000);
        let result = pipeline().run(engine.as_ref(), &request).await.unwrap();
        assert_eq!(result.metadata.title, "Two anchors");
        assert_eq!(
            launcher.stats().page_timeouts(),
            vec![Duration::from_millis(30_000), Duration::from_millis(60_000)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_selector_times_out_and_closes_once() {
        let launcher = FakeLauncher::new().with_page("https://site.test/", two_anchor_site().into_page());
        let engine = engine(&launcher).await;

        let mut request = ScrapeRequest::new("https://site.test/");
        request.wait_for_selector = Some("#missing".into());

        let started = tokio::time::Instant::now();
        let err = pipeline().run(engine.as_ref(), &request).await.unwrap_err();
        assert!(matches!(
            err,
            ScrapeError::SelectorTimeout { ref selector, timeout_ms: 10_000 } if selector == "#missing"
        ));
        assert!(started.elapsed() >= SELECTOR_TIMEOUT);
        assert_eq!(launcher.stats().contexts_opened(), 1);
        assert_eq!(launcher.stats().contexts_closed(), 1);
    }

    #[tokio::test]
    async fn present_selector_passes() {
        let site = two_anchor_site().selector("a");
        let launcher = FakeLauncher::new().with_page("https://site.test/", site.into_page());
        let engine = engine(&launcher).await;

        let mut request = ScrapeRequest::new("https://site.test/");
        request.wait_for_selector = Some("a".into());
        assert!(pipeline().run(engine.as_ref(), &request).await.is_ok());
    }

    #[tokio::test]
    async fn navigation_failure_closes_context() {
        let launcher = FakeLauncher::new();
        let engine = engine(&launcher).await;

        let err = pipeline()
            .run(engine.as_ref(), &ScrapeRequest::new("https://unknown.test/"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "navigation");
        assert!(err.to_string().contains("ERR_NAME_NOT_RESOLVED"));
        assert_eq!(launcher.stats().contexts_closed(), 1);
        assert_eq!(launcher.stats().open_contexts(), 0);
    }

    #[tokio::test]
    async fn extraction_failure_closes_context() {
        // A page that answers no scripts fails at text extraction.
        let launcher = FakeLauncher::new().with_page(
            "https://bare.test/",
            scrapegate_browser::testing::FakePage::new("<html></html>"),
        );
        let engine = engine(&launcher).await;

        let err = pipeline()
            .run(engine.as_ref(), &ScrapeRequest::new("https://bare.test/"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "extraction");
        assert_eq!(launcher.stats().contexts_closed(), 1);
    }

    #[tokio::test]
    async fn close_failure_does_not_mask_result() {
        let launcher = FakeLauncher::new().with_page("https://site.test/", two_anchor_site().into_page());
        launcher.fail_context_close(true);
        let engine = engine(&launcher).await;

        let out = pipeline()
            .run(engine.as_ref(), &ScrapeRequest::new("https://site.test/"))
            .await
            .unwrap();
        assert_eq!(out.metadata.title, "Two anchors");
        assert_eq!(launcher.stats().contexts_closed(), 1);
    }

    #[tokio::test]
    async fn concurrent_requests_are_isolated() {
        let launcher = FakeLauncher::new();
        for i in 0..8u64 {
            let site = SiteFixture::new(format!("<html><body>page {i}</body></html>"))
                .title(format!("Page {i}"))
                .text(format!("page {i}"))
                .navigation_delay(Duration::from_millis(40 - i * 5));
            launcher.add_page(format!("https://site.test/{i}"), site.into_page());
        }
        let engine = engine(&launcher).await;
        let pipeline = Arc::new(pipeline());

        let tasks: Vec<_> = (0..8u64)
            .map(|i| {
                let engine = Arc::clone(&engine);
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move {
                    let mut request = ScrapeRequest::new(format!("https://site.test/{i}"));
                    request.formats = BTreeSet::from([Format::Html, Format::Text]);
                    (i, pipeline.run(engine.as_ref(), &request).await)
                })
            })
            .collect();

        for task in tasks {
            let (i, out) = task.await.unwrap();
            let out = out.unwrap();
            assert_eq!(out.metadata.title, format!("Page {i}"));
            assert_eq!(out.data.text.as_deref(), Some(format!("page {i}").as_str()));
            assert!(out.data.html.unwrap().contains(&format!("page {i}")));
        }
        assert_eq!(launcher.stats().contexts_opened(), 8);
        assert_eq!(launcher.stats().contexts_closed(), 8);
    }
}
