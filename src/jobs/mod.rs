//! Submit-then-poll simulation jobs.
//!
//! A [SimulationBackend] accepts work and reports status; callers poll with
//! [poll_until_terminal] until the job is finished or failed. There is no
//! cancellation: a caller that loses interest simply stops polling.

pub mod queue;
pub mod simc;

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use queue::JobQueue;
pub use simc::SimcRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Finished,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

/// Simulator input text plus extra command-line arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimInput {
    pub simc_text: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// What a successful run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimOutput {
    /// Parsed JSON report; an empty object when the simulator wrote none.
    pub json: Value,
    pub html: String,
    pub stdout: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub status: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<SimOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub submitted_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job `{0}` not found")]
    NotFound(String),
    #[error("job queue is no longer accepting work")]
    QueueClosed,
    #[error("job `{job_id}` still not finished after {polls} status checks")]
    PollLimit { job_id: String, polls: usize },
}

#[derive(Debug, Error)]
pub enum SimRunError {
    #[error("simulation workspace error: {0}")]
    Io(#[from] std::io::Error),
    #[error("simc rc={code}\n{output}")]
    Exit { code: i32, output: String },
    #[error("simc report is not valid json: {0}")]
    Report(#[from] serde_json::Error),
}

/// Job submission and status lookup.
pub trait SimulationBackend: Send + Sync {
    fn submit(&self, input: SimInput) -> Result<String, JobError>;
    fn status(&self, job_id: &str) -> Result<JobStatus, JobError>;
}

/// Runs one simulation to completion, blocking the calling thread.
pub trait SimRunner: Send + Sync {
    fn run(&self, input: &SimInput) -> Result<SimOutput, SimRunError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    /// `None` polls until a terminal status.
    pub max_polls: Option<usize>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_polls: None,
        }
    }
}

/// Poll at a fixed interval until the job is finished or failed.
/// `on_status` sees every status observed, including the terminal one.
pub fn poll_until_terminal(
    backend: &dyn SimulationBackend,
    job_id: &str,
    options: PollOptions,
    mut on_status: impl FnMut(&JobStatus),
) -> Result<JobStatus, JobError> {
    let mut polls = 0usize;
    loop {
        let status = backend.status(job_id)?;
        polls += 1;
        on_status(&status);
        if status.status.is_terminal() {
            return Ok(status);
        }
        if options.max_polls.is_some_and(|max| polls >= max) {
            return Err(JobError::PollLimit {
                job_id: job_id.to_string(),
                polls,
            });
        }
        thread::sleep(options.interval);
    }
}
