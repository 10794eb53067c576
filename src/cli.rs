//! Command-line interface definitions for headline_grid.
//!
//! Credentials can be provided via flags or environment variables, so the
//! usual invocation needs no flags at all.

use crate::browser::webdriver::BROWSERSTACK_HUB_URL;
use crate::pipeline::{DEFAULT_MAX_ARTICLES, DEFAULT_READY_TIMEOUT, DEFAULT_TARGET_LANGUAGE};
use crate::site::EL_PAIS_OPINION_URL;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Credentials from the environment, built-in browser matrix
/// BROWSERSTACK_USERNAME=me BROWSERSTACK_ACCESS_KEY=key headline_grid
///
/// # Local run only, through a running chromedriver, with translation
/// headline_grid --skip-remote --local-webdriver-url http://localhost:9515 \
///     --translate-api-key $GOOGLE_TRANSLATE_API_KEY
///
/// # Custom matrix, non-zero exit when any environment fails
/// headline_grid --environments grid.yaml --fail-on-error
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// BrowserStack user name
    #[arg(long, env = "BROWSERSTACK_USERNAME")]
    pub browserstack_username: Option<String>,

    /// BrowserStack access key
    #[arg(long, env = "BROWSERSTACK_ACCESS_KEY", hide_env_values = true)]
    pub browserstack_access_key: Option<String>,

    /// Google Cloud Translation API key; translation is skipped without it
    #[arg(long, env = "GOOGLE_TRANSLATE_API_KEY", hide_env_values = true)]
    pub translate_api_key: Option<String>,

    /// Directory for downloaded cover images
    #[arg(short, long, default_value = "article_images")]
    pub images_dir: PathBuf,

    /// YAML file describing the environments to run (built-in matrix otherwise)
    #[arg(short, long)]
    pub environments: Option<PathBuf>,

    /// Remote WebDriver hub
    #[arg(long, default_value = BROWSERSTACK_HUB_URL)]
    pub hub_url: String,

    /// WebDriver endpoint for the local run (e.g. chromedriver); the page is
    /// fetched as static HTML when absent
    #[arg(long, env = "LOCAL_WEBDRIVER_URL")]
    pub local_webdriver_url: Option<String>,

    /// Section page to scrape
    #[arg(long, default_value = EL_PAIS_OPINION_URL)]
    pub section_url: String,

    /// Number of articles to process per page
    #[arg(long, default_value_t = DEFAULT_MAX_ARTICLES)]
    pub max_articles: usize,

    /// Seconds to wait for the first article to appear on the page
    #[arg(long, default_value_t = DEFAULT_READY_TIMEOUT.as_secs())]
    pub ready_timeout: u64,

    /// Language headlines are translated into
    #[arg(long, default_value = DEFAULT_TARGET_LANGUAGE)]
    pub target_language: String,

    /// Skip the local run
    #[arg(long)]
    pub skip_local: bool,

    /// Skip the remote runs
    #[arg(long)]
    pub skip_remote: bool,

    /// Exit non-zero when any environment fails
    #[arg(long)]
    pub fail_on_error: bool,

    /// Print the run report as JSON on stdout when done
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["headline_grid"]);

        assert_eq!(cli.images_dir, PathBuf::from("article_images"));
        assert_eq!(cli.hub_url, BROWSERSTACK_HUB_URL);
        assert_eq!(cli.section_url, EL_PAIS_OPINION_URL);
        assert_eq!(cli.max_articles, 5);
        assert_eq!(cli.ready_timeout, 15);
        assert_eq!(cli.target_language, "en");
        assert!(!cli.skip_local);
        assert!(!cli.fail_on_error);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "headline_grid",
            "--browserstack-username",
            "user",
            "--browserstack-access-key",
            "key",
            "-i",
            "/tmp/images",
            "-e",
            "grid.yaml",
            "--max-articles",
            "3",
            "--ready-timeout",
            "30",
            "--skip-local",
            "--fail-on-error",
        ]);

        assert_eq!(cli.browserstack_username.as_deref(), Some("user"));
        assert_eq!(cli.browserstack_access_key.as_deref(), Some("key"));
        assert_eq!(cli.images_dir, PathBuf::from("/tmp/images"));
        assert_eq!(cli.environments, Some(PathBuf::from("grid.yaml")));
        assert_eq!(cli.max_articles, 3);
        assert_eq!(cli.ready_timeout, 30);
        assert!(cli.skip_local);
        assert!(cli.fail_on_error);
    }
}
