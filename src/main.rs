//! # headline_grid
//!
//! Scrapes the El País opinion section, downloads each article's cover image,
//! translates the headlines, and reports words that keep coming back. The
//! same workflow then runs across a grid of remote browsers in parallel,
//! each environment passing or failing on its own.
//!
//! ## Usage
//!
//! ```sh
//! BROWSERSTACK_USERNAME=me BROWSERSTACK_ACCESS_KEY=key \
//! GOOGLE_TRANSLATE_API_KEY=key headline_grid
//! ```
//!
//! ## Architecture
//!
//! 1. **Orchestrator**: local run first, then every remote environment on its own worker
//! 2. **SessionRunner**: acquire session → run pipeline → report status → close
//! 3. **ArticlePipeline**: navigate, wait, extract the first few articles, translate
//! 4. **Extraction**: ordered fallback strategies for title, summary and cover image
//! 5. **Analysis**: word frequency over the translated headlines

use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod analysis;
mod browser;
mod cli;
mod download;
mod environments;
mod error;
mod extract;
mod models;
mod orchestrator;
mod pipeline;
mod session;
mod site;
mod translate;
mod utils;

use browser::Automation;
use browser::html::{HttpPageSource, StaticAutomation};
use browser::webdriver::{Credentials, GridOptions, WebDriverAutomation};
use cli::Cli;
use download::{HttpFetcher, ImageDownloader};
use environments::Matrix;
use orchestrator::{Orchestrator, RunReport};
use pipeline::ArticlePipeline;
use session::SessionRunner;
use site::SiteProfile;
use translate::{GoogleTranslate, RetryTranslate, Translate};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("headline_grid starting up");
    let args = Cli::parse();
    debug!(?args.images_dir, ?args.environments, "Parsed CLI arguments");

    // ---- Environment matrix ----
    let matrix = match &args.environments {
        Some(path) => Matrix::load(path)?,
        None => Matrix::builtin(),
    };
    let local = matrix.local.as_ref().filter(|_| !args.skip_local);
    let remotes = if args.skip_remote { &[][..] } else { &matrix.remote[..] };

    // ---- Credentials ----
    let credentials = grid_credentials(
        args.browserstack_username.as_deref(),
        args.browserstack_access_key.as_deref(),
        !remotes.is_empty(),
    )?;

    if let Err(e) = ensure_writable_dir(&args.images_dir.to_string_lossy()).await {
        error!(
            path = %args.images_dir.display(),
            error = %e,
            "Image directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Pipeline ----
    let site = SiteProfile::el_pais_opinion().with_section_url(args.section_url.clone());
    let downloader = ImageDownloader::new(Arc::new(HttpFetcher::new()?), args.images_dir.clone());
    let mut pipeline = ArticlePipeline::new(site)
        .with_max_articles(args.max_articles)
        .with_ready_timeout(std::time::Duration::from_secs(args.ready_timeout))
        .with_downloader(downloader);

    match args.translate_api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => {
            let translator: Arc<dyn Translate> = Arc::new(RetryTranslate::new(
                GoogleTranslate::new(key)?,
                2,
                std::time::Duration::from_secs(1),
            ));
            pipeline = pipeline.with_translator(translator, &args.target_language);
            info!(target_language = %args.target_language, "Translation enabled");
        }
        None => warn!("No translation API key; translation and headline analysis will be skipped"),
    }

    // ---- Automation backends ----
    let grid = GridOptions {
        project_name: "El Pais Scraper".to_string(),
        build_name: format!("El Pais Opinion {}", chrono::Local::now().format("%Y-%m-%d %H:%M")),
    };
    let local_automation: Arc<dyn Automation> = match &args.local_webdriver_url {
        Some(url) => Arc::new(WebDriverAutomation::new(url, None, grid.clone())?),
        None => Arc::new(StaticAutomation::new(Arc::new(HttpPageSource::new()?))),
    };
    let remote_automation: Arc<dyn Automation> =
        Arc::new(WebDriverAutomation::new(&args.hub_url, credentials, grid)?);

    let runner = SessionRunner::new(local_automation, remote_automation, Arc::new(pipeline));
    let report = Orchestrator::new(Arc::new(runner)).run(local, remotes).await;

    print_summary(&report, &args);

    if args.json {
        let json = serde_json::to_string_pretty(&report_json(&report))?;
        println!("{json}");
    }

    if args.fail_on_error && report.failed_count() > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Grid credentials, required only when remote environments will run.
fn grid_credentials(
    username: Option<&str>,
    access_key: Option<&str>,
    remotes_requested: bool,
) -> Result<Option<Credentials>, Box<dyn Error>> {
    let credentials = match (username, access_key) {
        (Some(username), Some(access_key)) if !username.is_empty() && !access_key.is_empty() => {
            Some(Credentials {
                username: username.to_string(),
                access_key: access_key.to_string(),
            })
        }
        _ => None,
    };
    if remotes_requested && credentials.is_none() {
        error!("BrowserStack credentials are required for remote environments (or pass --skip-remote)");
        return Err(error::Error::MissingCredential("BROWSERSTACK_USERNAME / BROWSERSTACK_ACCESS_KEY").into());
    }
    Ok(credentials)
}

fn print_summary(report: &RunReport, args: &Cli) {
    for result in report.all() {
        match &result.reason {
            None => info!(
                environment = %result.config.name,
                label = %result.config.label(),
                elapsed = ?result.elapsed,
                "PASSED"
            ),
            Some(reason) => warn!(
                environment = %result.config.name,
                label = %result.config.label(),
                stage = ?result.failed_stage,
                %reason,
                "FAILED"
            ),
        }
    }
    info!(
        total = report.all().count(),
        failed = report.failed_count(),
        elapsed = ?report.elapsed,
        images_dir = %args.images_dir.display(),
        "All runs completed; check the images directory for downloaded covers"
    );
}

fn report_json(report: &RunReport) -> serde_json::Value {
    let environments = report
        .all()
        .map(|r| {
            serde_json::json!({
                "name": r.config.name,
                "target": r.config.target,
                "label": r.config.label(),
                "status": r.status,
                "reason": r.reason,
                "failed_stage": r.failed_stage,
                "elapsed_ms": r.elapsed.as_millis() as u64,
                "output": r.output,
            })
        })
        .collect::<Vec<_>>();
    serde_json::json!({
        "environments": environments,
        "failed": report.failed_count(),
        "elapsed_ms": report.elapsed.as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_credentials_required_for_remotes() {
        let err = grid_credentials(None, Some("key"), true).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing credential: BROWSERSTACK_USERNAME / BROWSERSTACK_ACCESS_KEY"
        );
        assert!(grid_credentials(Some(""), Some("key"), true).is_err());
    }

    #[test]
    fn test_grid_credentials_optional_without_remotes() {
        assert!(grid_credentials(None, None, false).unwrap().is_none());

        let credentials = grid_credentials(Some("me"), Some("key"), true).unwrap().unwrap();
        assert_eq!(credentials.username, "me");
        assert_eq!(credentials.access_key, "key");
    }
}
