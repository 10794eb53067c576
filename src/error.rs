//! Error taxonomy shared by the pipeline, the session runner and the
//! collaborator adapters.
//!
//! Only errors that can end an article, a session or the process live here.
//! Missing fields and missing images are not errors: they surface as the
//! sentinels in [`crate::models`] or as `None`.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No article-shaped element appeared before the readiness timeout.
    #[error("no element matching `{selector}` appeared within {timeout:?}")]
    ContentNotReady { selector: String, timeout: Duration },

    /// The automation collaborator could not hand out a session.
    #[error("could not acquire a session for `{environment}`: {reason}")]
    SessionAcquisition { environment: String, reason: String },

    #[error("translation failed: {0}")]
    Translation(String),

    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    /// A W3C WebDriver error payload (`value.error` / `value.message`).
    #[error("webdriver {code}: {message}")]
    WebDriver { code: String, message: String },

    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("invalid environment matrix: {0}")]
    InvalidEnvironments(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl Error {
    /// WebDriver reports a missing child element as an error; callers that
    /// probe for optional markup treat it as absence instead.
    pub fn is_no_such_element(&self) -> bool {
        matches!(self, Error::WebDriver { code, .. } if code == "no such element")
    }
}
