//! Job manager and progress channel.
//!
//! A job wraps one pipeline run. Observers attach to a job and receive the
//! last event immediately, then every later event until a terminal one.
//! Finished jobs stay in the registry for the retention window so late
//! subscribers still see the outcome.

mod events;

pub use events::ProgressEvent;

use dashmap::DashMap;
use futures::Stream;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};
use ulid::Ulid;

use crate::config::JobConfig;
use crate::portal::Credentials;
use crate::scrape::{
    NoProgress, Phase, ProgressSink, ScrapeError, ScrapeMode, ScrapePipeline, ScrapeResult,
    validate_credentials,
};
use crate::utils::fmt_duration;

/// Opaque job identifier (a ULID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Ulid);

impl JobId {
    fn new() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for JobId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

impl Serialize for JobId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Error,
}

impl JobState {
    pub fn is_finished(self) -> bool {
        matches!(self, JobState::Done | JobState::Error)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job not found")]
    NotFound,
}

/// Registry counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub total: usize,
    pub queued: usize,
    pub running: usize,
    pub finished: usize,
}

struct Job {
    state: JobState,
    last_event: ProgressEvent,
    subscribers: Vec<mpsc::UnboundedSender<ProgressEvent>>,
    cleanup: Option<JoinHandle<()>>,
}

/// Process-wide job registry plus the pipeline that jobs run.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct JobManager {
    jobs: Arc<DashMap<JobId, Job>>,
    pipeline: Arc<ScrapePipeline>,
    config: JobConfig,
}

impl JobManager {
    pub fn new(pipeline: Arc<ScrapePipeline>, config: JobConfig) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            pipeline,
            config,
        }
    }

    /// Register a queued job with its initial progress event.
    ///
    /// A job that is never run is still removed once the job timeout plus the
    /// retention window has passed.
    pub fn create_job(&self) -> JobId {
        let id = JobId::new();
        let mut job = Job {
            state: JobState::Queued,
            last_event: ProgressEvent::queued(),
            subscribers: Vec::new(),
            cleanup: None,
        };
        job.cleanup = Some(self.spawn_cleanup(id, self.config.timeout + self.config.retention));
        self.jobs.insert(id, job);
        debug!(job_id = %id, "job created");
        id
    }

    /// Validate input, create a job and start it in the background.
    pub fn start(&self, credentials: Credentials, mode: ScrapeMode) -> Result<JobId, ScrapeError> {
        validate_credentials(&credentials)?;
        let id = self.create_job();
        self.run_job(id, credentials, mode);
        Ok(id)
    }

    /// Run the pipeline for `id` on a new task. Returns immediately.
    pub fn run_job(&self, id: JobId, credentials: Credentials, mode: ScrapeMode) {
        let manager = self.clone();
        let span = tracing::info_span!("job", job_id = %id, %mode);
        tokio::spawn(
            async move {
                manager.execute(id, credentials, mode).await;
            }
            .instrument(span),
        );
    }

    async fn execute(&self, id: JobId, credentials: Credentials, mode: ScrapeMode) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.state = JobState::Running;
        }
        info!(username = %credentials.username, "job started");

        let reporter = JobReporter { manager: self, id };
        let limit = self.config.timeout;
        let event = match tokio::time::timeout(
            limit,
            self.pipeline.run(&credentials, mode, &reporter),
        )
        .await
        {
            Ok(Ok(result)) => ProgressEvent::done(result),
            Ok(Err(e)) => {
                warn!(error = %e, kind = e.kind().as_str(), "job failed");
                ProgressEvent::failed(&e)
            }
            Err(_) => {
                warn!(timeout = fmt_duration(limit), "job timed out");
                ProgressEvent::failed(&timed_out(limit))
            }
        };
        self.push_event(&id, event);
    }

    /// Record `event` as the job's latest and fan it out to subscribers.
    ///
    /// Subscribers whose channel is gone are dropped. A terminal event closes
    /// every subscriber and restarts the retention timer. Events after a
    /// terminal one are ignored.
    pub fn push_event(&self, id: &JobId, mut event: ProgressEvent) {
        let Some(mut job) = self.jobs.get_mut(id) else {
            debug!(job_id = %id, "event for unknown job dropped");
            return;
        };
        if job.last_event.is_terminal() {
            debug!(job_id = %id, phase = %event.phase(), "event after terminal event ignored");
            return;
        }

        event.raise_percent(job.last_event.percent());
        job.subscribers.retain(|tx| tx.send(event.clone()).is_ok());

        if event.is_terminal() {
            job.state = match event {
                ProgressEvent::Done { .. } => JobState::Done,
                _ => JobState::Error,
            };
            job.subscribers.clear();
            if let Some(previous) = job.cleanup.take() {
                previous.abort();
            }
            job.cleanup = Some(self.spawn_cleanup(*id, self.config.retention));
            debug!(job_id = %id, state = ?job.state, "job finished");
        }
        job.last_event = event;
    }

    /// Subscribe to a job. The current event is delivered first.
    pub fn attach(&self, id: &JobId) -> Result<JobSubscription, JobError> {
        let mut job = self.jobs.get_mut(id).ok_or(JobError::NotFound)?;
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(job.last_event.clone());
        if !job.last_event.is_terminal() {
            job.subscribers.push(tx);
        }
        Ok(JobSubscription { rx })
    }

    pub fn state(&self, id: &JobId) -> Option<JobState> {
        self.jobs.get(id).map(|job| job.state)
    }

    pub fn stats(&self) -> JobStats {
        let mut stats = JobStats::default();
        for job in self.jobs.iter() {
            stats.total += 1;
            match job.state {
                JobState::Queued => stats.queued += 1,
                JobState::Running => stats.running += 1,
                JobState::Done | JobState::Error => stats.finished += 1,
            }
        }
        stats
    }

    /// Run a scrape inline without registering a job.
    pub async fn run_and_wait(
        &self,
        credentials: Credentials,
        mode: ScrapeMode,
    ) -> Result<ScrapeResult, ScrapeError> {
        let limit = self.config.timeout;
        match tokio::time::timeout(limit, self.pipeline.run(&credentials, mode, &NoProgress)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(timed_out(limit)),
        }
    }

    fn spawn_cleanup(&self, id: JobId, after: Duration) -> JoinHandle<()> {
        let jobs = Arc::clone(&self.jobs);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if jobs.remove(&id).is_some() {
                debug!(job_id = %id, "job removed from registry");
            }
        })
    }
}

fn timed_out(limit: Duration) -> ScrapeError {
    ScrapeError::SessionFailure {
        message: "scrape timed out".to_string(),
        details: format!("no result after {}", fmt_duration(limit)),
    }
}

/// Feeds pipeline checkpoints into the job's event stream.
struct JobReporter<'a> {
    manager: &'a JobManager,
    id: JobId,
}

impl ProgressSink for JobReporter<'_> {
    fn report(&self, percent: u8, phase: Phase, message: &str) {
        debug!(percent, %phase, "progress");
        self.manager
            .push_event(&self.id, ProgressEvent::progress(percent, phase, message));
    }
}

/// One observer's view of a job. Ends after a terminal event.
pub struct JobSubscription {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl JobSubscription {
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|event| (event, sub))
        })
    }
}
