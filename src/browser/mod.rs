//! Page automation collaborators.
//!
//! The pipeline only ever talks to these three traits:
//!
//! - [`Automation`]: hands out one [`Session`] per environment
//! - [`Session`]: a loaded page that can be navigated, waited on and queried
//! - [`Element`]: a borrowed handle to one rendered element
//!
//! Selectors are CSS selectors in every backend.
//!
//! # Backends
//!
//! | Backend | Module | Notes |
//! |---------|--------|-------|
//! | Static HTML | [`html`] | Fetches the page over HTTP and parses it with `scraper` |
//! | WebDriver | [`webdriver`] | W3C WebDriver client for chromedriver or a remote grid |
//!
//! All calls block. Sessions are created and used inside a single worker, so
//! neither sessions nor elements need to be `Send`.

pub mod html;
pub mod webdriver;

use crate::error::Result;
use crate::models::{EnvironmentConfig, Status};
use std::time::Duration;

/// A borrowed handle to one element of the rendered page.
///
/// `Ok(None)` from [`Element::query_one`] means "no such child"; an `Err`
/// means the handle itself is unusable.
pub trait Element {
    fn query_one(&self, selector: &str) -> Result<Option<Box<dyn Element + '_>>>;
    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn Element + '_>>>;
    /// Visible text with whitespace runs collapsed to single spaces.
    fn text(&self) -> Result<String>;
    fn attribute(&self, name: &str) -> Result<Option<String>>;
}

pub trait Session {
    fn navigate(&mut self, url: &str) -> Result<()>;
    /// Block until `selector` matches at least one element or `timeout`
    /// elapses. Returns whether the element appeared.
    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool>;
    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn Element + '_>>>;
    /// Tell the environment how the run went. A no-op for local backends.
    fn report_status(&mut self, status: Status, reason: &str) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Factory for sessions. Shared read-only between workers.
pub trait Automation: Send + Sync {
    fn open_session(&self, config: &EnvironmentConfig) -> Result<Box<dyn Session>>;
}
