//! Drives one invoice upload from submission to a terminal OCR status.
//!
//! The coordinator owns a single tracked [`UploadJob`] and at most one
//! polling task. Every state change goes through a generation counter: any
//! response produced under an older generation (after `reset`,
//! `cancel_polling` or a new `submit`) is dropped instead of applied.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcast::{UploadEvent, UploadEventBroadcaster};
use crate::config::ClientConfig;
use crate::error::{FacturasError, PollError, SubmissionError, ValidationError};
use crate::sanitize::hash_filename;
use crate::upload::api::UploadApi;
use crate::upload::file::{validate_file_with, CandidateFile, FileRules, ValidFile};
use crate::upload::model::{UploadJob, UploadStatus};

/// Timing of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Pause between observing `COMPLETED` and firing the success hook.
    pub completion_delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for PollSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            completion_delay: config.completion_delay(),
        }
    }
}

/// Final result of a workflow, delivered once per job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    Completed { job: UploadJob },
    Failed { job: UploadJob, message: String },
}

impl UploadOutcome {
    pub fn job(&self) -> &UploadJob {
        match self {
            UploadOutcome::Completed { job } | UploadOutcome::Failed { job, .. } => job,
        }
    }
}

/// Read-only view of the coordinator for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSnapshot {
    pub job: Option<UploadJob>,
    pub is_polling: bool,
    pub last_error: Option<String>,
}

/// How a reported job was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    /// Not for the tracked job or from an older generation.
    Stale,
    /// For the tracked job but not applied (unknown status, regression,
    /// or the job is already terminal).
    Ignored,
    Updated { changed: bool },
    Terminal,
}

struct TaskSlot {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl TaskSlot {
    fn stop(self) {
        self.token.cancel();
        self.handle.abort();
    }
}

#[derive(Default)]
struct CoordinatorState {
    job: Option<UploadJob>,
    generation: u64,
    poll: Option<TaskSlot>,
    notify: Option<TaskSlot>,
    last_error: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct OutcomeState {
    generation: u64,
    active: bool,
    outcome: Option<UploadOutcome>,
}

struct Inner<A: UploadApi> {
    api: A,
    settings: PollSettings,
    rules: FileRules,
    state: Mutex<CoordinatorState>,
    events: UploadEventBroadcaster,
    outcome: watch::Sender<OutcomeState>,
}

/// Coordinates one upload-and-await-processing workflow.
///
/// Polling tasks are spawned on the current Tokio runtime. Dropping the
/// coordinator stops them.
pub struct UploadCoordinator<A: UploadApi> {
    inner: Arc<Inner<A>>,
}

impl<A: UploadApi> UploadCoordinator<A> {
    pub fn new(api: A, config: &ClientConfig) -> Self {
        Self::with_settings(api, PollSettings::from(config), FileRules::from(config))
    }

    pub fn with_settings(api: A, settings: PollSettings, rules: FileRules) -> Self {
        let (outcome, _) = watch::channel(OutcomeState::default());
        Self {
            inner: Arc::new(Inner {
                api,
                settings,
                rules,
                state: Mutex::new(CoordinatorState::default()),
                events: UploadEventBroadcaster::default(),
                outcome,
            }),
        }
    }

    pub fn settings(&self) -> PollSettings {
        self.inner.settings
    }

    /// Subscribes to submitted/status/completed/failed events.
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.inner.events.subscribe()
    }

    pub fn snapshot(&self) -> UploadSnapshot {
        let state = self.inner.lock();
        UploadSnapshot {
            job: state.job.clone(),
            is_polling: state.poll.is_some(),
            last_error: state.last_error.clone(),
        }
    }

    pub fn is_polling(&self) -> bool {
        self.inner.lock().poll.is_some()
    }

    /// Checks a file against this coordinator's rules.
    pub fn validate_file(&self, file: CandidateFile) -> Result<ValidFile, ValidationError> {
        validate_file_with(file, &self.inner.rules)
    }

    /// Sends a validated file and starts polling the returned job.
    ///
    /// Any previously tracked job is discarded first. If `reset` runs while
    /// the request is in flight, the created job is returned but not tracked.
    pub async fn submit(&self, file: ValidFile) -> Result<UploadJob, SubmissionError> {
        self.reset();
        let generation = self.inner.lock().generation;

        info!(file = %hash_filename(file.name()), bytes = file.len(), "Submitting invoice PDF");

        let upload_id = match self.inner.api.submit(&file).await {
            Ok(id) => id,
            Err(e) => {
                let mut state = self.inner.lock();
                if state.generation == generation {
                    state.last_error = Some(e.to_string());
                }
                return Err(e);
            }
        };

        let job = UploadJob::accepted(&upload_id, file.name());
        if !self.inner.begin_tracking(generation, job.clone()) {
            debug!(upload_id = %upload_id, "Coordinator was reset during submission, not tracking");
            return Ok(job);
        }

        self.inner.events.send(UploadEvent::submitted(&job));
        self.start_polling(&upload_id, self.inner.settings.interval);
        Ok(job)
    }

    /// Validates and submits in one step. A validation failure is kept as
    /// `last_error` until the next submit or reset.
    pub async fn upload(&self, file: CandidateFile) -> Result<UploadJob, FacturasError> {
        let file = self.validate_file(file).inspect_err(|e| {
            self.inner.lock().last_error = Some(e.to_string());
        })?;
        Ok(self.submit(file).await?)
    }

    /// Starts tracking an upload that was submitted elsewhere, e.g. an id
    /// reported by an earlier session, and polls it.
    pub fn resume(&self, upload_id: &str) -> bool {
        self.reset();
        let generation = self.inner.lock().generation;
        if !self
            .inner
            .begin_tracking(generation, UploadJob::accepted(upload_id, ""))
        {
            return false;
        }
        self.start_polling(upload_id, self.inner.settings.interval)
    }

    /// Fetches the job status once and applies it if it belongs to the
    /// tracked job. Returns the tracked job after the update, or the
    /// reported job when it is not the tracked one.
    pub async fn poll_once(&self, job_id: &str) -> Result<UploadJob, PollError> {
        let generation = self.inner.lock().generation;
        let response = self.inner.api.fetch_status(job_id).await?;
        let reported = UploadJob::from_response(response);

        match Inner::handle_report(&self.inner, generation, reported.clone()) {
            Applied::Stale => Ok(reported),
            _ => Ok(self.inner.lock().job.clone().unwrap_or(reported)),
        }
    }

    /// Starts polling `job_id` every `interval`, with one poll right away.
    ///
    /// Replaces any running poller. Returns `false` without polling when
    /// `job_id` is not the tracked job, the tracked job is already terminal,
    /// or no Tokio runtime is available.
    pub fn start_polling(&self, job_id: &str, interval: Duration) -> bool {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Cannot start polling outside a Tokio runtime: {}", e);
                return false;
            }
        };

        let mut state = self.inner.lock();
        match &state.job {
            Some(job) if job.id == job_id && !job.is_terminal() => {}
            Some(job) if job.id == job_id => {
                debug!(upload_id = %job_id, "Job already terminal, not polling");
                return false;
            }
            _ => {
                warn!(upload_id = %job_id, "Refusing to poll a job that is not tracked");
                return false;
            }
        }

        if let Some(previous) = state.poll.take() {
            previous.stop();
        }

        let generation = state.generation;
        let token = CancellationToken::new();
        let handle = runtime.spawn(run_poll_loop(
            Arc::clone(&self.inner),
            job_id.to_string(),
            generation,
            interval.max(Duration::from_millis(1)),
            token.clone(),
        ));
        state.poll = Some(TaskSlot { token, handle });
        drop(state);

        self.inner.outcome.send_modify(|current| {
            current.generation = generation;
            current.active = true;
        });
        debug!(upload_id = %job_id, interval_ms = interval.as_millis() as u64, "Polling started");
        true
    }

    /// Stops polling and any pending completion hook. Safe to call at any
    /// time and any number of times; responses still in flight are dropped.
    pub fn cancel_polling(&self) {
        self.inner.cancel_polling();
    }

    /// Returns to the initial state: no job, no polling, no error.
    pub fn reset(&self) {
        let mut state = self.inner.lock();
        state.generation += 1;
        state.job = None;
        state.last_error = None;
        stop_tasks(&mut state);
        let generation = state.generation;
        drop(state);

        self.inner.outcome.send_replace(OutcomeState {
            generation,
            active: false,
            outcome: None,
        });
    }

    /// Waits for the tracked job's outcome. Resolves to `None` when nothing
    /// is being tracked, or when the workflow is reset or cancelled first.
    pub async fn wait_for_outcome(&self) -> Option<UploadOutcome> {
        let mut rx = self.inner.outcome.subscribe();

        let generation = {
            let current = rx.borrow_and_update();
            if let Some(outcome) = &current.outcome {
                return Some(outcome.clone());
            }
            if !current.active {
                return None;
            }
            current.generation
        };

        loop {
            if rx.changed().await.is_err() {
                return None;
            }

            let current = rx.borrow_and_update();
            if current.generation != generation {
                return None;
            }
            if let Some(outcome) = &current.outcome {
                return Some(outcome.clone());
            }
            if !current.active {
                return None;
            }
        }
    }
}

impl<A: UploadApi> Drop for UploadCoordinator<A> {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        stop_tasks(&mut state);
    }
}

fn stop_tasks(state: &mut CoordinatorState) {
    if let Some(poll) = state.poll.take() {
        poll.stop();
    }
    if let Some(notify) = state.notify.take() {
        notify.stop();
    }
}

impl<A: UploadApi> Inner<A> {
    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs `job` as the tracked job if nothing changed since
    /// `generation` was read.
    fn begin_tracking(&self, generation: u64, job: UploadJob) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.generation += 1;
        state.job = Some(job);
        state.last_error = None;
        let generation = state.generation;
        drop(state);

        self.outcome.send_replace(OutcomeState {
            generation,
            active: true,
            outcome: None,
        });
        true
    }

    fn cancel_polling(&self) {
        let mut state = self.lock();
        let was_running = state.poll.is_some() || state.notify.is_some();
        state.generation += 1;
        stop_tasks(&mut state);
        let generation = state.generation;
        drop(state);

        if was_running {
            debug!("Polling cancelled");
        }

        self.outcome.send_modify(|current| {
            current.generation = generation;
            current.active = false;
        });
    }

    /// Applies a reported job to the tracked state.
    fn apply(&self, generation: u64, reported: UploadJob) -> Applied {
        let mut state = self.lock();
        if state.generation != generation {
            return Applied::Stale;
        }

        let Some(current) = state.job.as_mut() else {
            return Applied::Stale;
        };

        if current.id != reported.id {
            return Applied::Stale;
        }

        if current.is_terminal() {
            return Applied::Ignored;
        }

        let (Some(new_rank), Some(old_rank)) = (reported.status.rank(), current.status.rank())
        else {
            warn!(
                upload_id = %reported.id,
                status = reported.status.as_str(),
                "Unknown upload status, continuing to poll"
            );
            return Applied::Ignored;
        };

        if new_rank < old_rank {
            warn!(
                upload_id = %reported.id,
                from = current.status.as_str(),
                to = reported.status.as_str(),
                "Ignoring status regression"
            );
            return Applied::Ignored;
        }

        let changed = reported.status != current.status;
        let UploadJob {
            filename,
            status,
            error_message,
            created_at,
            processed_at,
            result,
            ..
        } = reported;

        if !filename.is_empty() {
            current.filename = filename;
        }
        current.status = status;
        current.error_message = error_message;
        current.created_at = created_at.or(current.created_at.take());
        current.processed_at = processed_at.or(current.processed_at.take());
        current.result = result;

        if current.is_terminal() {
            Applied::Terminal
        } else {
            Applied::Updated { changed }
        }
    }

    /// Applies a report and fires whatever the transition calls for.
    fn handle_report(this: &Arc<Self>, generation: u64, reported: UploadJob) -> Applied {
        let upload_id = reported.id.clone();
        let applied = this.apply(generation, reported);

        match applied {
            Applied::Stale => {
                debug!(upload_id = %upload_id, "Discarding stale status response");
            }
            Applied::Ignored | Applied::Updated { changed: false } => {}
            Applied::Updated { changed: true } => {
                if let Some(job) = this.lock().job.clone() {
                    info!(upload_id = %job.id, status = job.status.as_str(), "Upload status changed");
                    this.events.send(UploadEvent::status_changed(&job));
                }
            }
            Applied::Terminal => Inner::finish(this, generation),
        }

        applied
    }

    /// Stops polling after a terminal status. Errors are reported at once;
    /// completion is reported after the configured delay, unless the
    /// workflow is reset or cancelled in between.
    fn finish(this: &Arc<Self>, generation: u64) {
        let mut state = this.lock();
        if state.generation != generation {
            return;
        }

        if let Some(poll) = state.poll.take() {
            // May be the calling task; it sees the token and exits.
            poll.token.cancel();
        }

        let Some(job) = state.job.clone() else {
            return;
        };

        let status = job.status.clone();
        match status {
            UploadStatus::Error => {
                let message = job.error_message.clone().unwrap_or_default();
                state.last_error = Some(message.clone());
                drop(state);

                info!(upload_id = %job.id, error = %message, "Upload processing failed");
                this.events.send(UploadEvent::failed(&job));
                this.publish(generation, UploadOutcome::Failed { job, message });
            }
            UploadStatus::Completed => {
                let token = CancellationToken::new();
                let delay = this.settings.completion_delay;
                let task_token = token.clone();
                let inner = Arc::clone(this);

                let handle = tokio::spawn(async move {
                    tokio::select! {
                        _ = task_token.cancelled() => {}
                        _ = tokio::time::sleep(delay) => Inner::notify_completed(&inner, generation),
                    }
                });

                if let Some(previous) = state.notify.replace(TaskSlot { token, handle }) {
                    previous.stop();
                }
                info!(upload_id = %job.id, "Upload processed, reporting completion");
            }
            _ => {}
        }
    }

    fn notify_completed(this: &Arc<Self>, generation: u64) {
        let mut state = this.lock();
        if state.generation != generation {
            return;
        }
        state.notify = None;

        let Some(job) = state.job.clone() else {
            return;
        };
        drop(state);

        this.events.send(UploadEvent::completed(&job));
        this.publish(generation, UploadOutcome::Completed { job });
    }

    fn publish(&self, generation: u64, outcome: UploadOutcome) {
        self.outcome.send_replace(OutcomeState {
            generation,
            active: false,
            outcome: Some(outcome),
        });
    }
}

/// Polls until the token is cancelled. Each poll completes before the next
/// tick is awaited, so requests for one job never overlap.
async fn run_poll_loop<A: UploadApi>(
    inner: Arc<Inner<A>>,
    job_id: String,
    generation: u64,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // A slow fetch leaves the next tick already due; cancellation wins.
    while !token.is_cancelled() {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = inner.api.fetch_status(&job_id) => result,
        };

        if token.is_cancelled() {
            break;
        }

        match result {
            Ok(response) => {
                Inner::handle_report(&inner, generation, UploadJob::from_response(response));
            }
            Err(e) => {
                warn!(
                    upload_id = %job_id,
                    error = %e,
                    transient = e.is_transient(),
                    "Status check failed, retrying on next tick"
                );
            }
        }
    }

    debug!(upload_id = %job_id, "Polling loop stopped");
}
