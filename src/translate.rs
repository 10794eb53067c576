//! Headline translation with exponential backoff retry logic.
//!
//! # Architecture
//!
//! - [`Translate`]: the collaborator trait the pipeline is given
//! - [`GoogleTranslate`]: Cloud Translation v2 REST client keyed by API key
//! - [`RetryTranslate`]: decorator that retries any [`Translate`] implementation
//!
//! # Retry Strategy
//!
//! - Exponential backoff starting at `base_delay`
//! - Delay capped at 10 seconds
//! - Random jitter (0-250ms) added to each wait

use crate::error::{Error, Result};
use rand::{Rng, rng};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{error, instrument, warn};

pub const GOOGLE_TRANSLATE_ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Text translation keyed by target language (`"en"`, `"fr"`, ...).
pub trait Translate: Send + Sync {
    fn translate(&self, text: &str, target_lang: &str) -> Result<String>;
}

/// Google Cloud Translation (v2 basic) client.
pub struct GoogleTranslate {
    client: Client,
    handle: Handle,
    endpoint: String,
    api_key: String,
}

impl GoogleTranslate {
    /// Must be called from inside a tokio runtime.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(GOOGLE_TRANSLATE_ENDPOINT, api_key)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            handle: Handle::current(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

impl fmt::Debug for GoogleTranslate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleTranslate")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

impl Translate for GoogleTranslate {
    #[instrument(level = "debug", skip(self, text))]
    fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        let request = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "q": text, "target": target_lang, "format": "text" }));

        self.handle.block_on(async {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Translation(format!(
                    "HTTP {status}: {}",
                    crate::utils::truncate_for_log(&body, 200)
                )));
            }
            let parsed: TranslateResponse = response.json().await?;
            parsed
                .data
                .translations
                .into_iter()
                .next()
                .map(|t| t.translated_text)
                .ok_or_else(|| Error::Translation("empty translations list".to_string()))
        })
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`Translate`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryTranslate<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T: Translate> RetryTranslate<T> {
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl<T> fmt::Debug for RetryTranslate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryTranslate")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T: Translate> Translate for RetryTranslate<T> {
    fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.translate(text, target_lang) {
                Ok(translated) => return Ok(translated),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "translate() exhausted retries"
                        );
                        return Err(e);
                    }

                    let shift = u32::try_from(attempt - 1).unwrap_or(u32::MAX).min(16);
                    let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "translate() attempt failed; backing off"
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }
}
