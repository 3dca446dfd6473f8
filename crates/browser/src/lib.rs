//! One shared Chrome/Chromium process driven over CDP, with an isolated
//! browsing context per caller.
//!
//! [`BrowserManager`] owns the process and relaunches it lazily when it goes
//! away. Callers get an [`engine::BrowserEngine`] handle, open a
//! [`engine::BrowsingContext`] and drive a [`engine::PageDriver`] in it.
//!
//! # Example
//!
//! ```ignore
//! use scrapegate_browser::{BrowserConfig, BrowserManager, ContextOptions};
//!
//! let manager = BrowserManager::new(BrowserConfig::default());
//! let engine = manager.acquire().await?;
//! let context = engine.new_context(&ContextOptions::default()).await?;
//! let page = context.new_page(Duration::from_secs(30)).await?;
//! let status = page.goto("https://example.com").await?;
//! context.close().await?;
//! ```

pub mod chromium;
pub mod detect;
pub mod engine;
pub mod error;
pub mod manager;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use {
    engine::{BrowserEngine, BrowsingContext, Launcher, PageDriver},
    error::BrowserError,
    manager::BrowserManager,
    types::{BrowserConfig, BrowserState, ContextOptions, MAX_PAGE_TIMEOUT, MAX_PAGE_TIMEOUT_MS},
};
