//! Field extraction for a single article node.
//!
//! Every field is resolved through an ordered list of attempts. An attempt
//! either yields a value or `None`, and the first value wins. Missing markup
//! never fails a record: it falls back to the sentinels in
//! [`crate::models`]. Only a broken node handle or an invalid selector is
//! returned as an error.

pub mod image;

use crate::browser::Element;
use crate::error::Result;
use crate::models::{SUMMARY_NOT_SCRAPED, TITLE_NOT_FOUND};
use crate::site::SiteProfile;
use tracing::debug;

pub use image::resolve_image_url;

/// Fields read from one article node, before translation and download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: String,
    pub summary: String,
    pub image_url: Option<String>,
}

/// Extract title, summary and cover image URL from `node`.
pub fn extract(node: &dyn Element, site: &SiteProfile) -> Result<ExtractedArticle> {
    let title = first_text(node, &[site.title_selector])?.unwrap_or_else(|| {
        debug!(selector = site.title_selector, "No heading in article");
        TITLE_NOT_FOUND.to_string()
    });

    let summary = first_text(node, site.summary_selectors)?
        .unwrap_or_else(|| SUMMARY_NOT_SCRAPED.to_string());

    let image_url = resolve_image_url(node, site)?;

    Ok(ExtractedArticle {
        title,
        summary,
        image_url,
    })
}

/// Text of the first selector that matches an element with non-empty text.
fn first_text(node: &dyn Element, selectors: &[&str]) -> Result<Option<String>> {
    for selector in selectors {
        if let Some(element) = node.query_one(selector)? {
            let text = element.text()?;
            let text = text.trim();
            if !text.is_empty() {
                return Ok(Some(text.to_string()));
            }
        }
    }
    Ok(None)
}
