//! Static HTML backend.
//!
//! Loads the page once per navigation through a [`PageSource`] and answers
//! queries from the parsed document. There is no script execution, so
//! [`Session::wait_for`] only checks the document that was loaded.

use super::{Automation, Element, Session};
use crate::error::{Error, Result};
use crate::models::{EnvironmentConfig, Status};
use itertools::Itertools;
use reqwest::Client;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument};

/// Desktop Chrome identifier, sent so naive bot filters serve the normal page.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can turn a URL into HTML.
pub trait PageSource: Send + Sync {
    fn load(&self, url: &str) -> Result<String>;
}

/// Fetches pages over HTTP with an async `reqwest` client, blocking the
/// calling worker on the runtime handle captured at construction.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: Client,
    handle: Handle,
}

impl HttpPageSource {
    /// Must be called from inside a tokio runtime.
    pub fn new() -> Result<Self> {
        let client = Client::builder().timeout(PAGE_TIMEOUT).build()?;
        Ok(Self {
            client,
            handle: Handle::current(),
        })
    }
}

impl PageSource for HttpPageSource {
    #[instrument(level = "debug", skip(self))]
    fn load(&self, url: &str) -> Result<String> {
        self.handle.block_on(async {
            let body = self
                .client
                .get(url)
                .header(USER_AGENT, BROWSER_USER_AGENT)
                .header(ACCEPT_LANGUAGE, "es,es-ES")
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;
            debug!(bytes = body.len(), "Loaded page");
            Ok(body)
        })
    }
}

/// Hands out [`HtmlSession`]s backed by one shared [`PageSource`].
#[derive(Clone)]
pub struct StaticAutomation {
    source: Arc<dyn PageSource>,
}

impl StaticAutomation {
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self { source }
    }
}

impl Automation for StaticAutomation {
    fn open_session(&self, config: &EnvironmentConfig) -> Result<Box<dyn Session>> {
        info!(environment = %config.name, "Opening static HTML session");
        Ok(Box::new(HtmlSession::new(Arc::clone(&self.source))))
    }
}

pub struct HtmlSession {
    source: Arc<dyn PageSource>,
    document: Option<Html>,
}

impl HtmlSession {
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self {
            source,
            document: None,
        }
    }
}

impl Session for HtmlSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        let body = self.source.load(url)?;
        self.document = Some(Html::parse_document(&body));
        Ok(())
    }

    fn wait_for(&mut self, selector: &str, _timeout: Duration) -> Result<bool> {
        let selector = parse_selector(selector)?;
        Ok(self
            .document
            .as_ref()
            .is_some_and(|doc| doc.select(&selector).next().is_some()))
    }

    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn Element + '_>>> {
        let selector = parse_selector(selector)?;
        Ok(match &self.document {
            Some(doc) => doc
                .select(&selector)
                .map(|e| Box::new(HtmlElement::new(e)) as Box<dyn Element + '_>)
                .collect(),
            None => Vec::new(),
        })
    }

    fn report_status(&mut self, _status: Status, _reason: &str) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.document = None;
        Ok(())
    }
}

/// An element of a parsed document.
#[derive(Debug, Clone, Copy)]
pub struct HtmlElement<'a>(ElementRef<'a>);

impl<'a> HtmlElement<'a> {
    pub fn new(element: ElementRef<'a>) -> Self {
        Self(element)
    }
}

impl Element for HtmlElement<'_> {
    fn query_one(&self, selector: &str) -> Result<Option<Box<dyn Element + '_>>> {
        let selector = parse_selector(selector)?;
        Ok(self
            .0
            .select(&selector)
            .next()
            .map(|e| Box::new(HtmlElement(e)) as Box<dyn Element + '_>))
    }

    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn Element + '_>>> {
        let selector = parse_selector(selector)?;
        Ok(self
            .0
            .select(&selector)
            .map(|e| Box::new(HtmlElement(e)) as Box<dyn Element + '_>)
            .collect())
    }

    fn text(&self) -> Result<String> {
        Ok(self.0.text().flat_map(str::split_whitespace).join(" "))
    }

    fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.0.value().attr(name).map(str::to_string))
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| Error::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}
