//! Cover image resolution.
//!
//! News markup offers the cover image in several shapes, so resolution runs
//! an ordered list of [`ImageStrategy`] values and keeps the first absolute
//! http(s) URL any of them produces:
//!
//! 1. an `img` inside a known media container
//! 2. a responsive `picture`: the first `source[srcset]` with a URL, else its `img`
//! 3. any `img` in the article
//!
//! From an `img`, the lazy-load attributes are preferred over `src`, and a
//! srcset-style value is reduced to its first candidate URL.

use crate::browser::Element;
use crate::error::Result;
use crate::site::SiteProfile;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStrategy {
    MediaContainer,
    ResponsivePicture,
    AnyImage,
}

impl ImageStrategy {
    pub const ORDER: [ImageStrategy; 3] = [
        ImageStrategy::MediaContainer,
        ImageStrategy::ResponsivePicture,
        ImageStrategy::AnyImage,
    ];

    fn resolve(self, node: &dyn Element, site: &SiteProfile) -> Result<Option<String>> {
        match self {
            ImageStrategy::MediaContainer => match node.query_one(&site.media_group_selector())? {
                Some(img) => url_from_attributes(img.as_ref(), site),
                None => Ok(None),
            },
            ImageStrategy::ResponsivePicture => {
                let Some(picture) = node.query_one(site.picture_selector)? else {
                    return Ok(None);
                };
                for source in picture.query_all(site.picture_source_selector)? {
                    if let Some(url) = source
                        .attribute("srcset")?
                        .filter(|v| v.contains("http"))
                        .and_then(|v| first_candidate(&v))
                    {
                        return Ok(Some(url));
                    }
                }
                match picture.query_one(site.image_selector)? {
                    Some(img) => url_from_attributes(img.as_ref(), site),
                    None => Ok(None),
                }
            }
            ImageStrategy::AnyImage => match node.query_one(site.image_selector)? {
                Some(img) => url_from_attributes(img.as_ref(), site),
                None => Ok(None),
            },
        }
    }
}

/// Resolve the cover image URL of an article node, if it has one.
pub fn resolve_image_url(node: &dyn Element, site: &SiteProfile) -> Result<Option<String>> {
    for strategy in ImageStrategy::ORDER {
        if let Some(url) = strategy.resolve(node, site)? {
            debug!(?strategy, %url, "Resolved cover image");
            return Ok(Some(url));
        }
    }
    debug!("No cover image candidate");
    Ok(None)
}

fn url_from_attributes(img: &dyn Element, site: &SiteProfile) -> Result<Option<String>> {
    for attr in site.image_attributes {
        if let Some(url) = img
            .attribute(attr)?
            .filter(|v| v.contains("http"))
            .and_then(|v| first_candidate(&v))
        {
            return Ok(Some(url));
        }
    }
    Ok(None)
}

/// First URL of a srcset-style list (`"a.jpg 1x, b.jpg 2x"`), kept only when
/// it is an absolute http(s) URL.
pub fn first_candidate(value: &str) -> Option<String> {
    let token = value.split(',').next()?.split_whitespace().next()?;
    let url = Url::parse(token).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| token.to_string())
}
