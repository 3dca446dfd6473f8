//! Turning raw script results into typed output.

use serde::{Deserialize, Serialize};

use crate::types::{Image, Link, PageMetadata};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLink {
    #[serde(default)]
    pub text: Option<String>,
    pub href: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawImage {
    pub src: String,
    #[serde(default)]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMetaTag {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub property: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<RawMetaTag>,
}

pub fn links(raw: Vec<RawLink>) -> Vec<Link> {
    raw.into_iter()
        .map(|l| Link {
            text: l.text.as_deref().map(str::trim).unwrap_or_default().to_string(),
            href: l.href,
        })
        .collect()
}

pub fn images(raw: Vec<RawImage>) -> Vec<Image> {
    raw.into_iter()
        .map(|i| Image {
            src: i.src,
            alt: i.alt.unwrap_or_default(),
        })
        .collect()
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

impl From<RawMetadata> for PageMetadata {
    fn from(raw: RawMetadata) -> Self {
        let mut metadata = PageMetadata {
            title: raw.title,
            ..Default::default()
        };

        for tag in &raw.tags {
            let key = non_empty(tag.name.as_ref()).or_else(|| non_empty(tag.property.as_ref()));
            if let Some(key) = key
                && let Some(content) = non_empty(tag.content.as_ref())
            {
                metadata.meta.insert(key.to_string(), content.to_string());
            }
        }

        // Open Graph fields come from the first tag with that property.
        let og = |property: &str| {
            raw.tags
                .iter()
                .find(|t| t.property.as_deref() == Some(property))
                .map(|t| t.content.clone().unwrap_or_default())
        };
        metadata.og_title = og("og:title");
        metadata.og_description = og("og:description");
        metadata.og_image = og("og:image");

        metadata
    }
}
