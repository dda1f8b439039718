//! Background job scheduling and execution.
//!
//! Jobs run periodically or in response to hooks fired by the server and
//! the analysis manager, such as status repair and frame image cleanup.

mod context;
mod handle;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use handle::{JobInfo, JobRun, JobRunStatus, JobScheduleInfo, SchedulerHandle};
pub use job::{BackgroundJob, HookEvent, JobError, JobSchedule, ShutdownBehavior};
pub use scheduler::{create_scheduler, JobScheduler};
