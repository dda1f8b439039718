use super::job::{BackgroundJob, HookEvent, JobSchedule};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::warn;

/// Information about a registered job for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub schedule: JobScheduleInfo,
    pub is_running: bool,
    pub last_run: Option<JobRun>,
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Serializable schedule information.
#[derive(Debug, Clone, Serialize)]
pub struct JobScheduleInfo {
    #[serde(rename = "type")]
    pub schedule_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hooks: Option<Vec<String>>,
}

impl From<JobSchedule> for JobScheduleInfo {
    fn from(schedule: JobSchedule) -> Self {
        match schedule {
            JobSchedule::Interval(duration) => JobScheduleInfo {
                schedule_type: "interval",
                value_secs: Some(duration.as_secs()),
                hooks: None,
            },
            JobSchedule::Hook(event) => JobScheduleInfo {
                schedule_type: "hook",
                value_secs: None,
                hooks: Some(vec![event.to_string()]),
            },
            JobSchedule::Combined { interval, hooks } => JobScheduleInfo {
                schedule_type: "combined",
                value_secs: interval.map(|d| d.as_secs()),
                hooks: Some(hooks.iter().map(|h| h.to_string()).collect()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobRunStatus {
    Running,
    Completed,
    Failed,
}

/// The most recent execution of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: JobRunStatus,
    pub error_message: Option<String>,
    pub triggered_by: String,
}

/// Shared state between scheduler and handle.
#[derive(Default)]
pub struct SharedJobState {
    /// Static job info (set at registration, never changes)
    pub jobs: HashMap<String, Arc<dyn BackgroundJob>>,
    pub running_jobs: HashSet<String>,
    pub last_runs: HashMap<String, JobRun>,
    /// Next due time of interval jobs.
    pub next_runs: HashMap<String, DateTime<Utc>>,
}

/// Handle to interact with the job scheduler from HTTP handlers.
#[derive(Clone)]
pub struct SchedulerHandle {
    hook_tx: mpsc::Sender<HookEvent>,
    shared_state: Arc<RwLock<SharedJobState>>,
}

impl SchedulerHandle {
    pub fn new(hook_tx: mpsc::Sender<HookEvent>, shared_state: Arc<RwLock<SharedJobState>>) -> Self {
        Self {
            hook_tx,
            shared_state,
        }
    }

    /// Sender that components use to fire hooks.
    pub fn hook_sender(&self) -> mpsc::Sender<HookEvent> {
        self.hook_tx.clone()
    }

    pub fn notify(&self, event: HookEvent) {
        if self.hook_tx.try_send(event).is_err() {
            warn!("Job scheduler did not accept hook {}", event);
        }
    }

    /// Information about all registered jobs, sorted by id.
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        let state = self.shared_state.read().await;
        let mut jobs: Vec<JobInfo> = state
            .jobs
            .iter()
            .map(|(job_id, job)| JobInfo {
                id: job_id.clone(),
                name: job.name().to_string(),
                description: job.description().to_string(),
                schedule: job.schedule().into(),
                is_running: state.running_jobs.contains(job_id),
                last_run: state.last_runs.get(job_id).cloned(),
                next_run_at: state.next_runs.get(job_id).copied(),
            })
            .collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        jobs
    }

    pub async fn is_job_running(&self, job_id: &str) -> bool {
        self.shared_state.read().await.running_jobs.contains(job_id)
    }

    pub async fn last_run(&self, job_id: &str) -> Option<JobRun> {
        self.shared_state.read().await.last_runs.get(job_id).cloned()
    }
}
