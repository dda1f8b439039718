//! Periodic correction of analysis statuses that disagree with reality.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, HookEvent, JobError, JobSchedule},
};
use std::time::Duration;
use tracing::info;

/// Fails videos marked completed without stored results, and videos left
/// analyzing with no task behind them (e.g. after a restart).
pub struct AnalysisStatusSyncJob {
    interval: Duration,
}

impl AnalysisStatusSyncJob {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl BackgroundJob for AnalysisStatusSyncJob {
    fn id(&self) -> &'static str {
        "analysis_status_sync"
    }

    fn name(&self) -> &'static str {
        "Analysis Status Sync"
    }

    fn description(&self) -> &'static str {
        "Fail analyses that were interrupted or left without results"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Combined {
            interval: Some(self.interval),
            hooks: vec![HookEvent::OnStartup],
        }
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let report = ctx
            .analysis
            .sync_status()
            .map_err(|e| JobError::ExecutionFailed(e.to_string()))?;

        if report.total() > 0 {
            info!(
                "Status sync failed {} videos: missing_results={:?}, interrupted={:?}",
                report.total(),
                report.missing_results,
                report.interrupted
            );
        }
        Ok(())
    }
}
