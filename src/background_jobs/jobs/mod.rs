//! Maintenance jobs run by the scheduler.

pub mod analysis_status_sync;
pub mod orphan_frame_cleanup;

pub use analysis_status_sync::AnalysisStatusSyncJob;
pub use orphan_frame_cleanup::{CleanupReport, OrphanFrameCleanupJob};
