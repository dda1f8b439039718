//! Removal of frame images whose video no longer exists.
//!
//! Deleting a video removes its frames, but a crash between the database
//! delete and the file cleanup, or an analysis cancelled mid-way, can leave
//! images behind.

use crate::analysis::video_id_from_image_name;
use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, HookEvent, JobError, JobSchedule},
};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub struct OrphanFrameCleanupJob {
    interval: Duration,
}

/// What one cleanup pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub scanned: usize,
    pub deleted: usize,
    pub errors: usize,
}

impl OrphanFrameCleanupJob {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn clean(&self, ctx: &JobContext) -> Result<CleanupReport, JobError> {
        let mut report = CleanupReport::default();
        if !ctx.frames_dir.exists() {
            debug!("Frames directory does not exist: {:?}", ctx.frames_dir);
            return Ok(report);
        }

        let known: HashSet<i64> = ctx
            .video_store
            .list_video_ids()
            .map_err(|e| JobError::ExecutionFailed(format!("Failed to list videos: {}", e)))?
            .into_iter()
            .collect();

        for entry in WalkDir::new(&ctx.frames_dir).min_depth(1) {
            if ctx.is_cancelled() {
                return Err(JobError::Cancelled);
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to read frames directory entry: {}", e);
                    report.errors += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(video_id) = entry.file_name().to_str().and_then(video_id_from_image_name)
            else {
                continue;
            };
            report.scanned += 1;
            if known.contains(&video_id) {
                continue;
            }

            match std::fs::remove_file(entry.path()) {
                Ok(()) => {
                    debug!("Deleted orphaned frame image {:?}", entry.path());
                    report.deleted += 1;
                }
                Err(e) => {
                    warn!("Failed to delete {:?}: {}", entry.path(), e);
                    report.errors += 1;
                }
            }
        }
        Ok(report)
    }
}

impl BackgroundJob for OrphanFrameCleanupJob {
    fn id(&self) -> &'static str {
        "orphan_frame_cleanup"
    }

    fn name(&self) -> &'static str {
        "Orphan Frame Cleanup"
    }

    fn description(&self) -> &'static str {
        "Delete frame images of videos that no longer exist"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Combined {
            interval: Some(self.interval),
            hooks: vec![HookEvent::OnAnalysisFinished],
        }
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        let report = self.clean(ctx)?;
        if report.deleted > 0 || report.errors > 0 {
            info!(
                "Orphan frame cleanup: scanned={}, deleted={}, errors={}",
                report.scanned, report.deleted, report.errors
            );
        }
        Ok(())
    }
}
