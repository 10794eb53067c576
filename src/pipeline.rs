//! The per-page article pipeline.
//!
//! 1. **Navigate** to the section page
//! 2. **Wait** (bounded) until an article element is present
//! 3. **Extract** the first `max_articles` nodes, skipping any node that errors
//! 4. **Download** each resolved cover image
//! 5. **Translate** real titles when a translator is configured
//! 6. **Analyze** the successfully translated titles for repeated words
//!
//! The translator and downloader are injected, so the pipeline holds no
//! global state and can be shared read-only between environment workers.

use crate::analysis::{self, WordFrequency};
use crate::browser::{Element, Session};
use crate::download::ImageDownloader;
use crate::error::{Error, Result};
use crate::extract;
use crate::models::{ArticleRecord, TRANSLATION_FAILED};
use crate::site::SiteProfile;
use crate::translate::Translate;
use crate::utils::truncate_for_log;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_MAX_ARTICLES: usize = 5;
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_TARGET_LANGUAGE: &str = "en";

/// Everything one pipeline run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineOutput {
    /// Article nodes present on the page, before the cap was applied.
    pub discovered: usize,
    pub records: Vec<ArticleRecord>,
    pub frequency: WordFrequency,
}

pub struct ArticlePipeline {
    site: SiteProfile,
    max_articles: usize,
    ready_timeout: Duration,
    target_language: String,
    translator: Option<Arc<dyn Translate>>,
    downloader: Option<ImageDownloader>,
}

impl ArticlePipeline {
    pub fn new(site: SiteProfile) -> Self {
        Self {
            site,
            max_articles: DEFAULT_MAX_ARTICLES,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
            translator: None,
            downloader: None,
        }
    }

    pub fn with_max_articles(mut self, max_articles: usize) -> Self {
        self.max_articles = max_articles;
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translate>, target_language: &str) -> Self {
        self.translator = Some(translator);
        self.target_language = target_language.to_string();
        self
    }

    pub fn with_downloader(mut self, downloader: ImageDownloader) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Run against `session`. `scope` namespaces downloaded images, normally
    /// the environment slug.
    #[instrument(level = "info", skip(self, session), fields(url = %self.site.section_url))]
    pub fn run(&self, session: &mut dyn Session, scope: &str) -> Result<PipelineOutput> {
        session.navigate(&self.site.section_url)?;

        if !session.wait_for(self.site.article_selector, self.ready_timeout)? {
            return Err(Error::ContentNotReady {
                selector: self.site.article_selector.to_string(),
                timeout: self.ready_timeout,
            });
        }
        info!("Articles loaded on the page");

        let nodes = session.query_all(self.site.article_selector)?;
        let discovered = nodes.len();
        info!(discovered, cap = self.max_articles, "Found article elements");

        let mut records = Vec::new();
        let mut translated_titles = Vec::new();

        for (i, node) in nodes.iter().take(self.max_articles).enumerate() {
            let position = i + 1;
            match self.process(node.as_ref(), position, scope) {
                Ok((record, translated)) => {
                    translated_titles.extend(translated);
                    records.push(record);
                }
                Err(e) => {
                    warn!(position, error = %e, "Skipping article after extraction error");
                }
            }
        }

        let frequency = analysis::analyze(&translated_titles);
        if translated_titles.is_empty() {
            info!("No translated headers available for analysis");
        } else if frequency.is_empty() {
            info!("No words repeated more than twice across translated headers");
        } else {
            info!(repeated = frequency.len(), "Words repeated more than twice across translated headers");
            for (word, count) in frequency.iter() {
                info!(%word, count, "Repeated word in translated headers");
            }
        }

        Ok(PipelineOutput {
            discovered,
            records,
            frequency,
        })
    }

    /// Build the record for one node. The second value is the translated
    /// title when translation succeeded.
    fn process(
        &self,
        node: &dyn Element,
        position: usize,
        scope: &str,
    ) -> Result<(ArticleRecord, Option<String>)> {
        let extracted = extract::extract(node, &self.site)?;
        info!(
            position,
            title = %extracted.title,
            summary = %truncate_for_log(&extracted.summary, 160),
            "Extracted article"
        );

        let image_path = match (&extracted.image_url, &self.downloader) {
            (Some(url), Some(downloader)) => {
                let destination = downloader.destination(scope, position);
                downloader.download(url, &destination).then_some(destination)
            }
            (None, _) => {
                debug!(position, "No valid cover image URL found");
                None
            }
            (Some(_), None) => None,
        };

        let (translated_title, succeeded) = self.translate_title(&extracted.title, position);

        let record = ArticleRecord {
            position,
            title: extracted.title,
            summary: extracted.summary,
            image_url: extracted.image_url,
            image_path,
            translated_title,
        };
        Ok((record, succeeded))
    }

    /// Returns the value stored on the record and, separately, the
    /// translation itself when it succeeded.
    fn translate_title(&self, title: &str, position: usize) -> (Option<String>, Option<String>) {
        let Some(translator) = &self.translator else {
            return (None, None);
        };
        if title == crate::models::TITLE_NOT_FOUND {
            debug!(position, "Title not found; skipping translation");
            return (None, None);
        }
        match translator.translate(title, &self.target_language) {
            Ok(translated) => {
                info!(position, translated = %translated, lang = %self.target_language, "Translated title");
                (Some(translated.clone()), Some(translated))
            }
            Err(e) => {
                warn!(position, %title, error = %e, "Error translating title");
                (Some(TRANSLATION_FAILED.to_string()), None)
            }
        }
    }
}
