//! Fixtures that serve a rendered site through the in-memory browser.

use std::time::Duration;

use {
    scrapegate_browser::testing::FakePage,
    serde_json::{Value, json},
};

use crate::scripts;

/// A page as the extraction scripts would see it.
#[derive(Debug, Clone, Default)]
pub struct SiteFixture {
    html: String,
    title: String,
    text: String,
    links: Vec<Value>,
    images: Vec<Value>,
    tags: Vec<Value>,
    selectors: Vec<String>,
    screenshot: Vec<u8>,
    status: Option<u16>,
    navigation_delay: Duration,
}

impl SiteFixture {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            status: Some(200),
            ..Default::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Visible text of the body.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// An anchor with its raw inner text and resolved href.
    pub fn link(mut self, text: &str, href: &str) -> Self {
        self.links.push(json!({ "text": text, "href": href }));
        self
    }

    pub fn image(mut self, src: &str, alt: Option<&str>) -> Self {
        self.images.push(json!({ "src": src, "alt": alt }));
        self
    }

    pub fn meta_name(self, name: &str, content: &str) -> Self {
        self.meta(Some(name), None, Some(content))
    }

    pub fn meta_property(self, property: &str, content: &str) -> Self {
        self.meta(None, Some(property), Some(content))
    }

    /// A `<meta>` tag with arbitrary attributes present or absent.
    pub fn meta(
        mut self,
        name: Option<&str>,
        property: Option<&str>,
        content: Option<&str>,
    ) -> Self {
        self.tags.push(json!({
            "name": name,
            "property": property,
            "content": content,
        }));
        self
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    pub fn screenshot(mut self, png: Vec<u8>) -> Self {
        self.screenshot = png;
        self
    }

    pub fn status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }

    pub fn navigation_delay(mut self, delay: Duration) -> Self {
        self.navigation_delay = delay;
        self
    }

    pub fn into_page(self) -> FakePage {
        let page = self
            .selectors
            .into_iter()
            .fold(FakePage::new(self.html), |page, s| page.selector(s));
        page.status(self.status)
            .screenshot(self.screenshot)
            .navigation_delay(self.navigation_delay)
            .script(scripts::VISIBLE_TEXT, Value::String(self.text))
            .script(scripts::LINKS, Value::Array(self.links))
            .script(scripts::IMAGES, Value::Array(self.images))
            .script(
                scripts::METADATA,
                json!({ "title": self.title, "tags": self.tags }),
            )
    }
}
