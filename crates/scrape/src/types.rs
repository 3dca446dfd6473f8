//! Request, result and metadata shapes of a scrape.

use std::collections::{BTreeMap, BTreeSet};

use {
    scrapegate_browser::MAX_PAGE_TIMEOUT_MS,
    serde::{Deserialize, Serialize},
};

use crate::error::ValidationError;

/// Output formats a caller can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Html,
    Text,
    Markdown,
}

fn default_formats() -> BTreeSet<Format> {
    BTreeSet::from([Format::Markdown, Format::Html])
}

fn default_true() -> bool {
    true
}

/// A request to render and extract one URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
    #[serde(default = "default_formats")]
    pub formats: BTreeSet<Format>,
    /// CSS selector that must appear before extraction starts.
    #[serde(default)]
    pub wait_for_selector: Option<String>,
    /// Page operation timeout in milliseconds; replaces the service default.
    #[serde(default)]
    pub wait_for_timeout: Option<u64>,
    #[serde(default)]
    pub extract_links: bool,
    #[serde(default)]
    pub extract_images: bool,
    /// Accepted for compatibility. Contexts always run JavaScript.
    #[serde(default = "default_true")]
    pub javascript_enabled: bool,
    #[serde(default)]
    pub screenshot: bool,
}

impl ScrapeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            formats: default_formats(),
            wait_for_selector: None,
            wait_for_timeout: None,
            extract_links: false,
            extract_images: false,
            javascript_enabled: true,
            screenshot: false,
        }
    }

    pub fn wants(&self, format: Format) -> bool {
        self.formats.contains(&format)
    }

    /// `text` and `markdown` share one extraction.
    pub fn wants_text(&self) -> bool {
        self.wants(Format::Text) || self.wants(Format::Markdown)
    }

    /// Check the request and normalize its URL.
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        let parsed = url::Url::parse(&self.url).map_err(|e| ValidationError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationError::UnsupportedScheme(parsed.scheme().to_string()));
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(ValidationError::InvalidUrl {
                url: self.url,
                reason: "missing host".into(),
            });
        }
        match self.wait_for_timeout {
            Some(0) => return Err(ValidationError::ZeroTimeout),
            Some(ms) if ms > MAX_PAGE_TIMEOUT_MS => {
                return Err(ValidationError::TimeoutTooLarge {
                    max_ms: MAX_PAGE_TIMEOUT_MS,
                });
            },
            _ => {},
        }
        self.url = parsed.to_string();
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub src: String,
    pub alt: String,
}

/// Extracted page content. Outputs that were not requested stay `None`
/// and serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub url: String,
    /// HTTP status of the navigation response.
    pub status: Option<u16>,
    pub html: Option<String>,
    pub text: Option<String>,
    pub markdown: Option<String>,
    pub links: Option<Vec<Link>>,
    pub images: Option<Vec<Image>>,
    /// Full-page PNG, lowercase hex.
    pub screenshot: Option<String>,
}

impl ScrapeResult {
    pub fn new(url: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            url: url.into(),
            status,
            ..Default::default()
        }
    }
}

/// Document title, `<meta>` tags and Open Graph fields. Always computed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub title: String,
    /// `<meta>` content keyed by `name`, else `property`.
    pub meta: BTreeMap<String, String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<String>,
}

/// Everything one successful scrape produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeOutput {
    pub data: ScrapeResult,
    pub metadata: PageMetadata,
}
