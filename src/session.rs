//! One environment run: acquire a session, run the pipeline, report the
//! outcome to the grid and always release the session.
//!
//! ```text
//! Acquiring ──► Running ──► Reporting ──► Closed
//!     │            │
//!     └────────────┴──► Failed (stage recorded on the result)
//! ```
//!
//! A failed status report is logged but does not change the outcome, and the
//! session is closed exactly once whenever one was acquired.
//!
//! Nothing escapes [`SessionRunner::run`]: errors and panics from the pipeline
//! become a `failed` [`EnvironmentResult`] for this environment only.

use crate::browser::{Automation, Session};
use crate::models::{EnvironmentConfig, EnvironmentResult, Stage, Status, Target};
use crate::pipeline::{ArticlePipeline, PipelineOutput};
use crate::utils::slugify;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

pub struct SessionRunner {
    local: Arc<dyn Automation>,
    remote: Arc<dyn Automation>,
    pipeline: Arc<ArticlePipeline>,
}

impl SessionRunner {
    pub fn new(
        local: Arc<dyn Automation>,
        remote: Arc<dyn Automation>,
        pipeline: Arc<ArticlePipeline>,
    ) -> Self {
        Self {
            local,
            remote,
            pipeline,
        }
    }

    fn automation_for(&self, target: Target) -> &dyn Automation {
        match target {
            Target::Local => self.local.as_ref(),
            Target::Remote => self.remote.as_ref(),
        }
    }

    #[instrument(level = "info", skip_all, fields(environment = %config.name, label = %config.label()))]
    pub fn run(&self, config: &EnvironmentConfig) -> EnvironmentResult {
        let started = Instant::now();

        let mut session = match self.automation_for(config.target).open_session(config) {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Session acquisition failed");
                return EnvironmentResult::failed(
                    config.clone(),
                    Stage::Acquiring,
                    e.to_string(),
                    started.elapsed(),
                );
            }
        };

        let outcome = self.run_pipeline(session.as_mut(), config);

        if config.target == Target::Remote {
            let (status, reason) = match &outcome {
                Ok(_) => (Status::Passed, "Test completed successfully".to_string()),
                Err(reason) => (Status::Failed, format!("Test failed: {reason}")),
            };
            if let Err(e) = session.report_status(status, &reason) {
                warn!(error = %e, %status, "Could not report session status");
            }
        }

        if let Err(e) = session.close() {
            warn!(error = %e, "Session teardown failed");
        } else {
            info!("Session closed");
        }

        let elapsed = started.elapsed();
        match outcome {
            Ok(output) => {
                info!(articles = output.records.len(), ?elapsed, "Environment PASSED");
                EnvironmentResult::passed(config.clone(), output, elapsed)
            }
            Err(reason) => {
                error!(%reason, ?elapsed, "Environment FAILED");
                EnvironmentResult::failed(config.clone(), Stage::Running, reason, elapsed)
            }
        }
    }

    fn run_pipeline(
        &self,
        session: &mut dyn Session,
        config: &EnvironmentConfig,
    ) -> Result<PipelineOutput, String> {
        let scope = slugify(&config.name);
        match panic::catch_unwind(AssertUnwindSafe(|| self.pipeline.run(session, &scope))) {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(format!("pipeline panicked: {}", panic_message(payload.as_ref()))),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
