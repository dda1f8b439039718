use super::context::JobContext;
use super::handle::{JobRun, JobRunStatus, SchedulerHandle, SharedJobState};
use super::job::{BackgroundJob, HookEvent, JobError, ShutdownBehavior};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Longest the loop sleeps without re-checking schedules.
const MAX_IDLE: Duration = Duration::from_secs(60);
const RUNNING_POLL: Duration = Duration::from_millis(100);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Manages background job scheduling and execution.
pub struct JobScheduler {
    /// Shared state accessible by SchedulerHandle
    shared_state: Arc<RwLock<SharedJobState>>,

    /// Currently running jobs with their task handles.
    running_handles: HashMap<String, JoinHandle<()>>,

    /// Cancellation tokens for each running job.
    job_cancel_tokens: HashMap<String, CancellationToken>,

    /// Receiver for hook events from the HTTP server and the analysis manager.
    hook_receiver: mpsc::Receiver<HookEvent>,

    /// Token to signal scheduler shutdown.
    shutdown_token: CancellationToken,

    /// Shared context provided to jobs during execution.
    job_context: JobContext,
}

impl JobScheduler {
    pub fn new(
        hook_receiver: mpsc::Receiver<HookEvent>,
        shutdown_token: CancellationToken,
        job_context: JobContext,
        shared_state: Arc<RwLock<SharedJobState>>,
    ) -> Self {
        Self {
            shared_state,
            running_handles: HashMap::new(),
            job_cancel_tokens: HashMap::new(),
            hook_receiver,
            shutdown_token,
            job_context,
        }
    }

    /// Register a job with the scheduler. Interval jobs are first due one
    /// interval after registration.
    pub async fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id().to_string();
        info!("Registering job: {} - {}", job_id, job.description());
        let mut state = self.shared_state.write().await;
        if let Some(interval) = job.schedule().interval() {
            state.next_runs.insert(job_id.clone(), next_run_after(Utc::now(), interval));
        }
        state.jobs.insert(job_id, job);
    }

    pub async fn job_count(&self) -> usize {
        self.shared_state.read().await.jobs.len()
    }

    /// Main scheduler loop.
    pub async fn run(&mut self) {
        let job_count = self.job_count().await;
        info!("Starting job scheduler with {} registered jobs", job_count);

        self.trigger_jobs_for_hook(HookEvent::OnStartup).await;

        loop {
            self.cleanup_completed_jobs().await;

            let sleep_duration = self.time_until_next_scheduled_job().await;
            debug!(
                "Scheduler sleeping for {:?} until next scheduled job",
                sleep_duration
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_jobs().await;
                }
                Some(event) = self.hook_receiver.recv() => {
                    debug!("Received hook event: {}", event);
                    self.trigger_jobs_for_hook(event).await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    /// Time until the earliest interval job is due, capped at [`MAX_IDLE`].
    /// A job still running past its due time is polled instead.
    async fn time_until_next_scheduled_job(&self) -> Duration {
        let state = self.shared_state.read().await;
        let now = Utc::now();
        state
            .next_runs
            .iter()
            .map(|(job_id, next_run)| {
                let wait = (*next_run - now).to_std().unwrap_or(Duration::ZERO);
                if state.running_jobs.contains(job_id) {
                    wait.max(RUNNING_POLL)
                } else {
                    wait
                }
            })
            .min()
            .map_or(MAX_IDLE, |d| d.min(MAX_IDLE))
    }

    async fn run_due_jobs(&mut self) {
        let now = Utc::now();
        let jobs_to_run: Vec<String> = {
            let state = self.shared_state.read().await;
            state
                .next_runs
                .iter()
                .filter(|(job_id, next_run)| {
                    **next_run <= now && !state.running_jobs.contains(*job_id)
                })
                .map(|(job_id, _)| job_id.clone())
                .collect()
        };

        for job_id in jobs_to_run {
            self.spawn_job(&job_id, "schedule").await;
        }
    }

    /// Trigger all jobs that listen for a specific hook event.
    async fn trigger_jobs_for_hook(&mut self, event: HookEvent) {
        let jobs_to_trigger: Vec<String> = {
            let state = self.shared_state.read().await;
            state
                .jobs
                .iter()
                .filter(|(job_id, job)| {
                    if state.running_jobs.contains(*job_id) {
                        debug!("Skipping hook trigger for already running job: {}", job_id);
                        return false;
                    }
                    job.schedule().listens_to(event)
                })
                .map(|(job_id, _)| job_id.clone())
                .collect()
        };

        let trigger = format!("hook:{}", event);
        for job_id in jobs_to_trigger {
            self.spawn_job(&job_id, &trigger).await;
        }
    }

    /// Spawn a job execution task.
    async fn spawn_job(&mut self, job_id: &str, triggered_by: &str) {
        let job = {
            let mut state = self.shared_state.write().await;
            let Some(job) = state.jobs.get(job_id).cloned() else {
                error!("Attempted to spawn unknown job: {}", job_id);
                return;
            };
            state.running_jobs.insert(job_id.to_string());
            state.last_runs.insert(
                job_id.to_string(),
                JobRun {
                    started_at: Utc::now(),
                    finished_at: None,
                    status: JobRunStatus::Running,
                    error_message: None,
                    triggered_by: triggered_by.to_string(),
                },
            );
            // Pushed forward now so the loop does not spin while the job runs.
            if let Some(interval) = job.schedule().interval() {
                state
                    .next_runs
                    .insert(job_id.to_string(), next_run_after(Utc::now(), interval));
            }
            job
        };

        info!("Starting job: {} (triggered_by: {})", job_id, triggered_by);

        let cancel_token = self.job_context.cancellation_token.child_token();
        self.job_cancel_tokens
            .insert(job_id.to_string(), cancel_token.clone());
        let ctx = self.job_context.with_token(cancel_token);

        let job_id_owned = job_id.to_string();
        let shared_state = Arc::clone(&self.shared_state);

        let handle = tokio::spawn(async move {
            let start_time = Instant::now();
            let result = tokio::task::spawn_blocking(move || job.execute(&ctx)).await;
            let elapsed = start_time.elapsed();

            let (status, error_msg) = match result {
                Ok(Ok(())) => {
                    info!(
                        "Job {} completed successfully in {:?}",
                        job_id_owned, elapsed
                    );
                    (JobRunStatus::Completed, None)
                }
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id_owned, elapsed);
                    (JobRunStatus::Failed, Some("Cancelled".to_string()))
                }
                Ok(Err(e)) => {
                    error!("Job {} failed after {:?}: {}", job_id_owned, elapsed, e);
                    (JobRunStatus::Failed, Some(e.to_string()))
                }
                Err(e) => {
                    error!("Job {} panicked after {:?}: {}", job_id_owned, elapsed, e);
                    (JobRunStatus::Failed, Some(format!("Task panic: {}", e)))
                }
            };

            let mut state = shared_state.write().await;
            state.running_jobs.remove(&job_id_owned);
            if let Some(run) = state.last_runs.get_mut(&job_id_owned) {
                run.finished_at = Some(Utc::now());
                run.status = status;
                run.error_message = error_msg;
            }
        });

        self.running_handles.insert(job_id.to_string(), handle);
    }

    /// Clean up handles for completed jobs.
    async fn cleanup_completed_jobs(&mut self) {
        let completed: Vec<String> = self
            .running_handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in completed {
            if let Some(handle) = self.running_handles.remove(&job_id) {
                let _ = handle.await;
            }
            self.job_cancel_tokens.remove(&job_id);
        }
    }

    /// Gracefully shut down the scheduler.
    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        let behaviors: HashMap<String, ShutdownBehavior> = {
            let state = self.shared_state.read().await;
            state
                .jobs
                .iter()
                .map(|(id, job)| (id.clone(), job.shutdown_behavior()))
                .collect()
        };

        for (job_id, token) in &self.job_cancel_tokens {
            if behaviors.get(job_id).copied().unwrap_or_default() == ShutdownBehavior::Cancellable {
                debug!("Cancelling job: {}", job_id);
                token.cancel();
            }
        }

        for (job_id, handle) in self.running_handles.drain() {
            if behaviors.get(&job_id) == Some(&ShutdownBehavior::WaitForCompletion) {
                info!("Waiting for job {} to complete...", job_id);
            }
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
        }

        self.job_cancel_tokens.clear();
        info!("Scheduler shutdown complete");
    }
}

fn next_run_after(from: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    from + chrono::Duration::from_std(interval).unwrap_or_default()
}

/// Create a scheduler and its handle. `hook_sender` must feed `hook_receiver`.
pub fn create_scheduler(
    hook_sender: mpsc::Sender<HookEvent>,
    hook_receiver: mpsc::Receiver<HookEvent>,
    shutdown_token: CancellationToken,
    job_context: JobContext,
) -> (JobScheduler, SchedulerHandle) {
    let shared_state = Arc::new(RwLock::new(SharedJobState::default()));
    let scheduler = JobScheduler::new(
        hook_receiver,
        shutdown_token,
        job_context,
        Arc::clone(&shared_state),
    );
    let handle = SchedulerHandle::new(hook_sender, shared_state);
    (scheduler, handle)
}
