//! Cover image download.
//!
//! A failed download never fails the article: bad status codes, timeouts and
//! write errors are logged and the record simply has no `image_path`.
//!
//! # Output Structure
//!
//! ```text
//! images_dir/
//! ├── chrome-windows-10/
//! │   ├── article_1_cover.jpg
//! │   └── article_2_cover.jpg
//! └── local-chrome/
//!     └── article_1_cover.jpg
//! ```
//!
//! File names come from the article's position in the batch, so a rerun
//! overwrites the previous images of the same environment.

use crate::browser::html::BROWSER_USER_AGENT;
use crate::error::{Error, Result};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{info, instrument, warn};

pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Network GET collaborator.
pub trait Fetch: Send + Sync {
    fn get(&self, url: &str, timeout: Duration, headers: &[(&str, &str)]) -> Result<FetchResponse>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    handle: Handle,
}

impl HttpFetcher {
    /// Must be called from inside a tokio runtime.
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            handle: Handle::current(),
        })
    }
}

impl Fetch for HttpFetcher {
    fn get(&self, url: &str, timeout: Duration, headers: &[(&str, &str)]) -> Result<FetchResponse> {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(v),
            ) {
                map.insert(name, value);
            }
        }
        let request = self.client.get(url).timeout(timeout).headers(map);

        self.handle.block_on(async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?.to_vec();
            Ok(FetchResponse { status, body })
        })
    }
}

/// Writes cover images under `output_dir/<scope>/article_<n>_cover.jpg`.
#[derive(Clone)]
pub struct ImageDownloader {
    fetcher: Arc<dyn Fetch>,
    output_dir: PathBuf,
    timeout: Duration,
}

impl ImageDownloader {
    pub fn new(fetcher: Arc<dyn Fetch>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            output_dir: output_dir.into(),
            timeout: DOWNLOAD_TIMEOUT,
        }
    }

    /// Deterministic destination for the `position`-th article (1-based).
    pub fn destination(&self, scope: &str, position: usize) -> PathBuf {
        self.output_dir
            .join(scope)
            .join(format!("article_{position}_cover.jpg"))
    }

    /// Download `url` to `destination`. Returns whether the file was written.
    #[instrument(level = "info", skip(self, destination), fields(path = %destination.display()))]
    pub fn download(&self, url: &str, destination: &Path) -> bool {
        match self.try_download(url, destination) {
            Ok(bytes) => {
                info!(bytes, "Cover image saved");
                true
            }
            Err(e) => {
                warn!(error = %e, "Cover image download failed");
                false
            }
        }
    }

    fn try_download(&self, url: &str, destination: &Path) -> Result<usize> {
        let headers = [("User-Agent", BROWSER_USER_AGENT)];
        let response = self.fetcher.get(url, self.timeout, &headers)?;
        if !(200..300).contains(&response.status) {
            return Err(Error::Download {
                url: url.to_string(),
                reason: format!("status code {}", response.status),
            });
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(destination, &response.body)?;
        Ok(response.body.len())
    }
}
