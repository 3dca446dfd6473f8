//! Chromium engine driven over CDP with chromiumoxide.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    chromiumoxide::{
        Browser, BrowserConfig as CdpBrowserConfig, Page,
        cdp::browser_protocol::{
            browser::BrowserContextId,
            emulation::SetDeviceMetricsOverrideParams,
            network::{LoaderId, SetUserAgentOverrideParams},
            page::{
                CaptureScreenshotFormat, EventLifecycleEvent, FrameId, NavigateParams,
                SetLifecycleEventsEnabledParams,
            },
            target::{CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams},
        },
        error::CdpError,
        handler::viewport::Viewport,
        page::ScreenshotParams,
    },
    futures::StreamExt,
    tokio::sync::RwLock,
    tracing::{debug, info, warn},
};

use crate::{
    detect,
    engine::{BrowserEngine, BrowsingContext, Launcher, PageDriver},
    error::BrowserError,
    types::{BrowserConfig, ContextOptions, VIEWPORT_HEIGHT, VIEWPORT_WIDTH},
};

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Launches a local Chromium process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromiumLauncher;

#[async_trait]
impl Launcher for ChromiumLauncher {
    async fn launch(&self, config: &BrowserConfig) -> Result<Arc<dyn BrowserEngine>, BrowserError> {
        Ok(Arc::new(ChromiumEngine::launch(config).await?))
    }
}

/// A Chromium process and its CDP connection.
///
/// Commands only need a shared borrow of the [`Browser`]; the write lock is
/// taken to close it.
pub struct ChromiumEngine {
    browser: Arc<RwLock<Browser>>,
    connected: Arc<AtomicBool>,
}

impl ChromiumEngine {
    pub async fn launch(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let detection = detect::detect_browser(config.chrome_path.as_deref());
        let Some(executable) = detection.path else {
            return Err(BrowserError::LaunchFailed(format!(
                "Chrome/Chromium not found. {}",
                detection.install_hint
            )));
        };

        let mut builder = CdpBrowserConfig::builder();

        // chromiumoxide defaults to headless; with_head() opens a window.
        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .chrome_executable(&executable)
            .viewport(Viewport {
                width: VIEWPORT_WIDTH,
                height: VIEWPORT_HEIGHT,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .request_timeout(config.cdp_request_timeout());

        for arg in config.launch_args() {
            builder = builder.arg(arg);
        }

        let cdp_config = builder.build().map_err(|e| {
            BrowserError::LaunchFailed(format!("failed to build browser config: {e}"))
        })?;

        let (browser, mut handler) = Browser::launch(cdp_config).await.map_err(|e| {
            let install_hint = detect::install_instructions();
            BrowserError::LaunchFailed(format!("browser launch failed: {e}\n\n{install_hint}"))
        })?;

        let connected = Arc::new(AtomicBool::new(true));
        let handler_connected = Arc::clone(&connected);
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!(?event, "browser event");
            }
            handler_connected.store(false, Ordering::SeqCst);
            debug!("browser event handler exited (connection closed)");
        });

        info!(
            path = %executable.display(),
            headless = config.headless,
            "launched chromium"
        );

        Ok(Self {
            browser: Arc::new(RwLock::new(browser)),
            connected,
        })
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn new_context(
        &self,
        options: &ContextOptions,
    ) -> Result<Box<dyn BrowsingContext>, BrowserError> {
        if !self.is_connected() {
            return Err(BrowserError::BrowserClosed);
        }
        let created = self
            .browser
            .read()
            .await
            .execute(CreateBrowserContextParams::default())
            .await?;
        let id = created.result.browser_context_id.clone();
        debug!(context = %id.inner(), "created browsing context");

        Ok(Box::new(ChromiumContext {
            label: id.inner().clone(),
            id,
            browser: Arc::clone(&self.browser),
            options: options.clone(),
        }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut browser = self.browser.write().await;
        let closed = browser.close().await;
        self.connected.store(false, Ordering::SeqCst);
        closed?;
        if let Err(e) = browser.wait().await {
            warn!(error = %e, "failed waiting for browser process to exit");
        }
        info!("chromium closed");
        Ok(())
    }
}

struct ChromiumContext {
    id: BrowserContextId,
    label: String,
    browser: Arc<RwLock<Browser>>,
    options: ContextOptions,
}

#[async_trait]
impl BrowsingContext for ChromiumContext {
    fn id(&self) -> &str {
        &self.label
    }

    async fn new_page(
        &self,
        default_timeout: Duration,
    ) -> Result<Box<dyn PageDriver>, BrowserError> {
        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(self.id.clone())
            .build()
            .map_err(BrowserError::Cdp)?;
        let page = self.browser.read().await.new_page(target).await?;

        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(self.options.viewport_width))
            .height(i64::from(self.options.viewport_height))
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(BrowserError::Cdp)?;
        page.execute(metrics).await?;
        page.execute(SetUserAgentOverrideParams::new(
            self.options.user_agent.clone(),
        ))
        .await?;
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await?;

        Ok(Box::new(ChromiumPage {
            page,
            timeout: default_timeout,
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.browser
            .read()
            .await
            .execute(DisposeBrowserContextParams::new(self.id.clone()))
            .await?;
        debug!(context = %self.label, "disposed browsing context");
        Ok(())
    }
}

/// Waits for the main frame's new document to go network-idle.
///
/// Events for other frames and for earlier documents (the `about:blank` a
/// page starts on, or a previous navigation) are ignored. Without a known
/// loader the first main-frame `init` picks the document to wait for.
struct IdleWatch {
    main_frame: Option<FrameId>,
    loader: Option<LoaderId>,
}

impl IdleWatch {
    fn new(main_frame: Option<FrameId>, loader: Option<LoaderId>) -> Self {
        Self { main_frame, loader }
    }

    fn observe(&mut self, frame_id: &FrameId, loader_id: &LoaderId, name: &str) -> bool {
        if self.main_frame.as_ref().is_some_and(|f| f != frame_id) {
            return false;
        }
        match self.loader {
            Some(ref loader) => name == "networkIdle" && loader == loader_id,
            None => {
                if name == "init" {
                    self.loader = Some(loader_id.clone());
                }
                false
            },
        }
    }
}

/// Script that is true once `selector` matches an element that is rendered
/// with a non-empty box and not `visibility: hidden`.
fn visible_check_js(selector: &str) -> Result<String, BrowserError> {
    let selector =
        serde_json::to_string(selector).map_err(|e| BrowserError::Cdp(e.to_string()))?;
    Ok(format!(
        "(() => {{ \
           const el = document.querySelector({selector}); \
           if (!el) return false; \
           if (getComputedStyle(el).visibility === 'hidden') return false; \
           const rect = el.getBoundingClientRect(); \
           return rect.width > 0 && rect.height > 0; \
         }})()"
    ))
}

struct ChromiumPage {
    page: Page,
    timeout: Duration,
}

impl ChromiumPage {
    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, BrowserError>>,
    ) -> Result<T, BrowserError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| {
                BrowserError::Timeout(format!(
                    "{what} exceeded {}ms",
                    self.timeout.as_millis()
                ))
            })?
    }

    async fn navigation_status(&self) -> Option<u16> {
        match tokio::time::timeout(self.timeout, self.page.wait_for_navigation_response()).await {
            Ok(Ok(Some(request))) => request
                .response
                .as_ref()
                .and_then(|r| u16::try_from(r.status).ok()),
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                debug!(error = %e, "no navigation response");
                None
            },
            Err(_) => None,
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&self, url: &str) -> Result<Option<u16>, BrowserError> {
        // Subscribe before navigating so the idle event cannot be missed.
        let mut lifecycle = self
            .page
            .event_listener::<EventLifecycleEvent>()
            .await?;
        let main_frame = self.page.mainframe().await?;

        self.bounded("navigation", async {
            let loader = match self.page.execute(NavigateParams::new(url)).await {
                Ok(response) => {
                    let navigated = response.result;
                    if let Some(error) = navigated.error_text {
                        return Err(BrowserError::NavigationFailed(error));
                    }
                    // Same-document navigation: no new document to wait for.
                    let Some(loader) = navigated.loader_id else {
                        return Ok(());
                    };
                    Some(loader)
                },
                // chromiumoxide stopped waiting but the page keeps loading.
                Err(CdpError::Timeout) => None,
                Err(e) => return Err(BrowserError::NavigationFailed(e.to_string())),
            };

            let mut idle = IdleWatch::new(main_frame, loader);
            while let Some(event) = lifecycle.next().await {
                if idle.observe(&event.frame_id, &event.loader_id, &event.name) {
                    return Ok(());
                }
            }
            Err(BrowserError::BrowserClosed)
        })
        .await?;

        Ok(self.navigation_status().await)
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let check_js = visible_check_js(selector)?;
        let deadline = tokio::time::Instant::now() + timeout;

        while tokio::time::Instant::now() < deadline {
            let found = self
                .page
                .evaluate(check_js.as_str())
                .await
                .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))?
                .into_value::<bool>()
                .unwrap_or(false);
            if found {
                return Ok(());
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }

        Err(BrowserError::Timeout(format!(
            "selector {selector} not visible after {}ms",
            timeout.as_millis()
        )))
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.bounded("content", async { Ok(self.page.content().await?) })
            .await
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        self.bounded("evaluate", async {
            let result = self
                .page
                .evaluate(script)
                .await
                .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))?;
            Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
        })
        .await
    }

    async fn screenshot_full_page(&self) -> Result<Vec<u8>, BrowserError> {
        self.bounded("screenshot", async {
            self.page
                .screenshot(
                    ScreenshotParams::builder()
                        .format(CaptureScreenshotFormat::Png)
                        .full_page(true)
                        .build(),
                )
                .await
                .map_err(|e| BrowserError::ScreenshotFailed(e.to_string()))
        })
        .await
    }
}
