//! Runs the local environment, then every remote environment in parallel.
//!
//! Each environment gets its own blocking worker. Workers share nothing but
//! the read-only [`SessionRunner`]; a worker that dies still yields a
//! `failed` result for its own configuration, and the orchestrator itself
//! never fails.

use crate::models::{EnvironmentConfig, EnvironmentResult, Stage};
use crate::session::{SessionRunner, panic_message};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, spawn_blocking};
use tracing::{error, info, instrument};

#[derive(Debug, Clone)]
pub struct RunReport {
    pub local: Option<EnvironmentResult>,
    /// One entry per remote configuration, in configuration order.
    pub remote: Vec<EnvironmentResult>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn all(&self) -> impl Iterator<Item = &EnvironmentResult> {
        self.local.iter().chain(self.remote.iter())
    }

    pub fn failed_count(&self) -> usize {
        self.all().filter(|r| !r.is_passed()).count()
    }
}

pub struct Orchestrator {
    runner: Arc<SessionRunner>,
}

impl Orchestrator {
    pub fn new(runner: Arc<SessionRunner>) -> Self {
        Self { runner }
    }

    #[instrument(level = "info", skip_all, fields(remote_count = remotes.len()))]
    pub async fn run(
        &self,
        local: Option<&EnvironmentConfig>,
        remotes: &[EnvironmentConfig],
    ) -> RunReport {
        let started = Instant::now();

        let local = match local {
            Some(config) => {
                info!(environment = %config.name, "Starting local run");
                let result = self.run_one(config.clone()).await;
                if !result.is_passed() {
                    error!(
                        environment = %config.name,
                        reason = result.reason.as_deref().unwrap_or_default(),
                        "Local run failed; continuing with remote environments"
                    );
                }
                Some(result)
            }
            None => None,
        };

        info!(count = remotes.len(), "Dispatching remote environments");
        let workers = remotes.iter().cloned().map(|config| {
            let runner = Arc::clone(&self.runner);
            spawn_blocking(move || runner.run(&config))
        });
        let joined = join_all(workers).await;

        let remote = remotes
            .iter()
            .zip(joined)
            .map(|(config, joined)| settle(config, joined, started))
            .collect::<Vec<_>>();

        let report = RunReport {
            local,
            remote,
            elapsed: started.elapsed(),
        };
        info!(
            environments = report.all().count(),
            failed = report.failed_count(),
            elapsed = ?report.elapsed,
            "All environments completed"
        );
        report
    }

    async fn run_one(&self, config: EnvironmentConfig) -> EnvironmentResult {
        let started = Instant::now();
        let runner = Arc::clone(&self.runner);
        let fallback = config.clone();
        settle(&fallback, spawn_blocking(move || runner.run(&config)).await, started)
    }
}

/// Turn a worker's join outcome into a result for its configuration.
fn settle(
    config: &EnvironmentConfig,
    joined: Result<EnvironmentResult, JoinError>,
    started: Instant,
) -> EnvironmentResult {
    match joined {
        Ok(result) => result,
        Err(e) => {
            let reason = if e.is_panic() {
                format!("worker panicked: {}", panic_message(e.into_panic().as_ref()))
            } else {
                format!("worker did not complete: {e}")
            };
            error!(environment = %config.name, %reason, "Environment worker lost");
            EnvironmentResult::failed(config.clone(), Stage::Running, reason, started.elapsed())
        }
    }
}
