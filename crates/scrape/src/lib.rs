//! Render a URL in an isolated browsing context and extract its content:
//! markup, visible text, links, images, a screenshot and page metadata.

pub mod error;
pub mod extract;
pub mod pipeline;
pub mod scripts;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use {
    error::{ScrapeError, ValidationError},
    pipeline::{ExtractionPipeline, SELECTOR_TIMEOUT},
    types::{Format, Image, Link, PageMetadata, ScrapeOutput, ScrapeRequest, ScrapeResult},
};
