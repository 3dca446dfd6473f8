//! In-memory browser engine for tests.
//!
//! Pages are registered per URL. Scripts are answered from a per-page table
//! keyed by the exact script text, so callers decide what each evaluation
//! returns. Every launch, context and close is counted.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {async_trait::async_trait, serde_json::Value};

use crate::{
    engine::{BrowserEngine, BrowsingContext, Launcher, PageDriver},
    error::BrowserError,
    types::{BrowserConfig, ContextOptions},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A rendered page served by the fake engine.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    status: Option<u16>,
    html: String,
    selectors: Vec<String>,
    scripts: HashMap<String, Value>,
    screenshot: Vec<u8>,
    navigation_delay: Duration,
    navigation_error: Option<String>,
}

impl FakePage {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            status: Some(200),
            html: html.into(),
            ..Default::default()
        }
    }

    pub fn status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }

    /// A selector that matches on this page.
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    /// Result returned when `script` is evaluated on this page.
    pub fn script(mut self, script: impl Into<String>, result: Value) -> Self {
        self.scripts.insert(script.into(), result);
        self
    }

    pub fn screenshot(mut self, png: Vec<u8>) -> Self {
        self.screenshot = png;
        self
    }

    pub fn navigation_delay(mut self, delay: Duration) -> Self {
        self.navigation_delay = delay;
        self
    }

    pub fn navigation_error(mut self, message: impl Into<String>) -> Self {
        self.navigation_error = Some(message.into());
        self
    }
}

/// Counters shared by a launcher and every engine it starts.
#[derive(Debug, Default)]
pub struct FakeStats {
    launches: AtomicUsize,
    engines_closed: AtomicUsize,
    contexts_opened: AtomicUsize,
    contexts_closed: AtomicUsize,
    pages_opened: AtomicUsize,
    peak_open_contexts: AtomicUsize,
    context_options: Mutex<Vec<ContextOptions>>,
    page_timeouts: Mutex<Vec<Duration>>,
}

impl FakeStats {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn engines_closed(&self) -> usize {
        self.engines_closed.load(Ordering::SeqCst)
    }

    pub fn contexts_opened(&self) -> usize {
        self.contexts_opened.load(Ordering::SeqCst)
    }

    pub fn contexts_closed(&self) -> usize {
        self.contexts_closed.load(Ordering::SeqCst)
    }

    pub fn pages_opened(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst)
    }

    /// Highest number of contexts open at the same time.
    pub fn peak_open_contexts(&self) -> usize {
        self.peak_open_contexts.load(Ordering::SeqCst)
    }

    /// Contexts opened and not yet closed.
    pub fn open_contexts(&self) -> usize {
        self.contexts_opened()
            .saturating_sub(self.contexts_closed())
    }

    pub fn context_options(&self) -> Vec<ContextOptions> {
        lock(&self.context_options).clone()
    }

    pub fn page_timeouts(&self) -> Vec<Duration> {
        lock(&self.page_timeouts).clone()
    }
}

type Pages = Arc<Mutex<HashMap<String, FakePage>>>;

/// Launcher that starts [`FakeEngine`]s.
#[derive(Default)]
pub struct FakeLauncher {
    stats: Arc<FakeStats>,
    pages: Pages,
    engines: Mutex<Vec<Arc<FakeEngine>>>,
    fail: AtomicBool,
    fail_context_close: Arc<AtomicBool>,
    launch_delay: Duration,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    pub fn with_page(self, url: impl Into<String>, page: FakePage) -> Self {
        self.add_page(url, page);
        self
    }

    pub fn add_page(&self, url: impl Into<String>, page: FakePage) {
        lock(&self.pages).insert(url.into(), page);
    }

    pub fn stats(&self) -> Arc<FakeStats> {
        Arc::clone(&self.stats)
    }

    /// Make subsequent launches fail with `LaunchFailed`.
    pub fn fail_launches(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Make context close report an error (the context still counts as
    /// closed).
    pub fn fail_context_close(&self, fail: bool) {
        self.fail_context_close.store(fail, Ordering::SeqCst);
    }

    /// Simulate every launched browser process dying.
    pub fn disconnect_all(&self) {
        for engine in lock(&self.engines).iter() {
            engine.connected.store(false, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self, _config: &BrowserConfig) -> Result<Arc<dyn BrowserEngine>, BrowserError> {
        if !self.launch_delay.is_zero() {
            tokio::time::sleep(self.launch_delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(BrowserError::LaunchFailed("fake launch failure".into()));
        }
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        let engine = Arc::new(FakeEngine {
            connected: AtomicBool::new(true),
            next_context: AtomicUsize::new(0),
            stats: Arc::clone(&self.stats),
            pages: Arc::clone(&self.pages),
            fail_context_close: Arc::clone(&self.fail_context_close),
        });
        lock(&self.engines).push(Arc::clone(&engine));
        Ok(engine)
    }
}

pub struct FakeEngine {
    connected: AtomicBool,
    next_context: AtomicUsize,
    stats: Arc<FakeStats>,
    pages: Pages,
    fail_context_close: Arc<AtomicBool>,
}

#[async_trait]
impl BrowserEngine for FakeEngine {
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
        let n = self.next_context.fetch_add(1, Ordering::SeqCst);
        self.stats.contexts_opened.fetch_add(1, Ordering::SeqCst);
        self.stats
            .peak_open_contexts
            .fetch_max(self.stats.open_contexts(), Ordering::SeqCst);
        lock(&self.stats.context_options).push(options.clone());
        Ok(Box::new(FakeContext {
            id: format!("fake-context-{n}"),
            stats: Arc::clone(&self.stats),
            pages: Arc::clone(&self.pages),
            fail_close: self.fail_context_close.load(Ordering::SeqCst),
        }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.connected.store(false, Ordering::SeqCst);
        self.stats.engines_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeContext {
    id: String,
    stats: Arc<FakeStats>,
    pages: Pages,
    fail_close: bool,
}

#[async_trait]
impl BrowsingContext for FakeContext {
    fn id(&self) -> &str {
        &self.id
    }

    async fn new_page(
        &self,
        default_timeout: Duration,
    ) -> Result<Box<dyn PageDriver>, BrowserError> {
        self.stats.pages_opened.fetch_add(1, Ordering::SeqCst);
        lock(&self.stats.page_timeouts).push(default_timeout);
        Ok(Box::new(FakeDriver {
            pages: Arc::clone(&self.pages),
            timeout: default_timeout,
            current: Mutex::new(None),
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.stats.contexts_closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(BrowserError::Cdp(format!("failed to dispose {}", self.id)));
        }
        Ok(())
    }
}

struct FakeDriver {
    pages: Pages,
    timeout: Duration,
    current: Mutex<Option<FakePage>>,
}

impl FakeDriver {
    fn loaded(&self) -> Result<FakePage, BrowserError> {
        lock(&self.current)
            .clone()
            .ok_or_else(|| BrowserError::NavigationFailed("no document loaded".into()))
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn goto(&self, url: &str) -> Result<Option<u16>, BrowserError> {
        let page = lock(&self.pages).get(url).cloned();
        let Some(page) = page else {
            return Err(BrowserError::NavigationFailed(format!(
                "net::ERR_NAME_NOT_RESOLVED at {url}"
            )));
        };

        if page.navigation_delay > self.timeout {
            tokio::time::sleep(self.timeout).await;
            return Err(BrowserError::Timeout(format!(
                "navigation exceeded {}ms",
                self.timeout.as_millis()
            )));
        }
        tokio::time::sleep(page.navigation_delay).await;

        if let Some(ref message) = page.navigation_error {
            return Err(BrowserError::NavigationFailed(message.clone()));
        }

        let status = page.status;
        *lock(&self.current) = Some(page);
        Ok(status)
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        if self.loaded()?.selectors.iter().any(|s| s == selector) {
            return Ok(());
        }
        tokio::time::sleep(timeout).await;
        Err(BrowserError::Timeout(format!(
            "selector {selector} not found after {}ms",
            timeout.as_millis()
        )))
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.loaded()?.html)
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        self.loaded()?
            .scripts
            .get(script)
            .cloned()
            .ok_or_else(|| BrowserError::JsEvalFailed("script not registered on fake page".into()))
    }

    async fn screenshot_full_page(&self) -> Result<Vec<u8>, BrowserError> {
        Ok(self.loaded()?.screenshot)
    }
}
