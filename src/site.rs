//! Selector profile for the scraped section.
//!
//! El País marks opinion pieces up as `<article>` elements with an `h2`
//! headline, an abstract in `p.c_d` (sometimes `div.c_d_p`), and a cover image
//! inside `div.c_m`, a `figure`, or a responsive `picture`.

/// Where to go and which selectors to try, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub section_url: String,
    pub article_selector: &'static str,
    pub title_selector: &'static str,
    pub summary_selectors: &'static [&'static str],
    /// Known media containers; queried together, first match in document order.
    pub media_selectors: &'static [&'static str],
    pub picture_selector: &'static str,
    pub picture_source_selector: &'static str,
    pub image_selector: &'static str,
    /// URL-bearing image attributes, lazy-load attributes first.
    pub image_attributes: &'static [&'static str],
}

pub const EL_PAIS_OPINION_URL: &str = "https://elpais.com/opinion/";

impl SiteProfile {
    pub fn el_pais_opinion() -> Self {
        Self {
            section_url: EL_PAIS_OPINION_URL.to_string(),
            article_selector: "article",
            title_selector: "h2",
            summary_selectors: &["p.c_d", "div.c_d_p"],
            media_selectors: &["div.c_m img", "figure img", "img.c_m_e", "img.c_d_m"],
            picture_selector: "picture",
            picture_source_selector: "source",
            image_selector: "img",
            image_attributes: &["data-srcset", "data-src", "src"],
        }
    }

    pub fn with_section_url(mut self, url: impl Into<String>) -> Self {
        self.section_url = url.into();
        self
    }

    pub fn media_group_selector(&self) -> String {
        self.media_selectors.join(", ")
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self::el_pais_opinion()
    }
}
