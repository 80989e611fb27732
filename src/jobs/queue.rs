//! In-process job backend: a channel drained by a fixed set of worker threads.
//!
//! Finished and failed jobs are kept for a result TTL and then dropped, so a
//! long-running server does not hold every report forever.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use crate::jobs::{JobError, JobState, JobStatus, SimInput, SimRunner, SimulationBackend};

struct QueuedJob {
    job_id: String,
    input: SimInput,
}

/// How long terminal jobs stay visible unless configured otherwise.
pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(500);

struct JobEntry {
    status: JobStatus,
    /// Set when the job reaches a terminal state.
    finished: Option<Instant>,
}

type JobTable = Arc<Mutex<HashMap<String, JobEntry>>>;

pub struct JobQueue {
    jobs: JobTable,
    sender: Mutex<Sender<QueuedJob>>,
    workers: usize,
    result_ttl: Duration,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl JobQueue {
    /// Spawn `workers` threads (at least one) that run jobs through `runner`.
    pub fn start(runner: Arc<dyn SimRunner>, workers: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::channel::<QueuedJob>();
        let receiver = Arc::new(Mutex::new(receiver));
        let jobs: JobTable = Arc::new(Mutex::new(HashMap::new()));

        for index in 0..workers {
            let receiver = Arc::clone(&receiver);
            let jobs = Arc::clone(&jobs);
            let runner = Arc::clone(&runner);
            let spawned = thread::Builder::new()
                .name(format!("topgear-job-{index}"))
                .spawn(move || worker_loop(&receiver, &jobs, runner.as_ref()));
            if let Err(err) = spawned {
                tracing::error!(index, error = %err, "failed to spawn job worker");
            }
        }
        tracing::info!(workers, "job queue started");

        Self {
            jobs,
            sender: Mutex::new(sender),
            workers,
            result_ttl: DEFAULT_RESULT_TTL,
        }
    }

    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn result_ttl(&self) -> Duration {
        self.result_ttl
    }

    /// Drop terminal jobs whose result TTL has run out as of `now`. Queued and
    /// running jobs are never dropped. Returns how many were removed.
    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let mut table = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let before = table.len();
        table.retain(|_, entry| {
            entry
                .finished
                .map_or(true, |finished| now.duration_since(finished) < self.result_ttl)
        });
        let evicted = before - table.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = table.len(), "expired job results dropped");
        }
        evicted
    }
}

fn worker_loop(receiver: &Mutex<Receiver<QueuedJob>>, jobs: &JobTable, runner: &dyn SimRunner) {
    loop {
        let next = receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        let Ok(job) = next else {
            return;
        };

        update(jobs, &job.job_id, |status| status.status = JobState::Running);
        tracing::info!(job_id = %job.job_id, "job running");

        let outcome = runner.run(&job.input);
        update(jobs, &job.job_id, |status| {
            status.finished_at = Some(timestamp());
            match outcome {
                Ok(output) => {
                    status.status = JobState::Finished;
                    status.result = Some(output);
                }
                Err(err) => {
                    status.status = JobState::Failed;
                    status.error = Some(err.to_string());
                }
            }
        });
    }
}

fn update(jobs: &JobTable, job_id: &str, apply: impl FnOnce(&mut JobStatus)) {
    let mut table = jobs.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(entry) = table.get_mut(job_id) {
        apply(&mut entry.status);
        if entry.status.status.is_terminal() {
            entry.finished = Some(Instant::now());
        }
        let status = &entry.status;
        match status.status {
            JobState::Finished => tracing::info!(job_id, "job finished"),
            JobState::Failed => {
                tracing::warn!(job_id, error = status.error.as_deref().unwrap_or(""), "job failed")
            }
            _ => {}
        }
    }
}

impl SimulationBackend for JobQueue {
    fn submit(&self, input: SimInput) -> Result<String, JobError> {
        self.evict_expired_at(Instant::now());
        let job_id = Uuid::new_v4().to_string();
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                job_id.clone(),
                JobEntry {
                    status: JobStatus {
                        job_id: job_id.clone(),
                        status: JobState::Queued,
                        result: None,
                        error: None,
                        submitted_at: timestamp(),
                        finished_at: None,
                    },
                    finished: None,
                },
            );

        let sent = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(QueuedJob {
                job_id: job_id.clone(),
                input,
            });
        if sent.is_err() {
            self.jobs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&job_id);
            return Err(JobError::QueueClosed);
        }
        tracing::info!(job_id = %job_id, "job queued");
        Ok(job_id)
    }

    fn status(&self, job_id: &str) -> Result<JobStatus, JobError> {
        self.evict_expired_at(Instant::now());
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .map(|entry| entry.status.clone())
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use crate::jobs::{poll_until_terminal, PollOptions, SimOutput, SimRunError};

    use super::*;

    struct EchoRunner;

    impl SimRunner for EchoRunner {
        fn run(&self, input: &SimInput) -> Result<SimOutput, SimRunError> {
            if input.simc_text.contains("explode") {
                return Err(SimRunError::Exit {
                    code: 3,
                    output: "bad input".to_string(),
                });
            }
            Ok(SimOutput {
                json: json!({ "echo": input.simc_text }),
                html: String::new(),
                stdout: "ok".to_string(),
            })
        }
    }

    fn poll(queue: &JobQueue, job_id: &str) -> JobStatus {
        let options = PollOptions {
            interval: Duration::from_millis(5),
            max_polls: Some(2000),
        };
        poll_until_terminal(queue, job_id, options, |_| {}).expect("job should reach a terminal state")
    }

    #[test]
    fn finished_job_carries_result() {
        let queue = JobQueue::start(Arc::new(EchoRunner), 2);
        let job_id = queue
            .submit(SimInput {
                simc_text: "warrior=x".to_string(),
                extra_args: Vec::new(),
            })
            .expect("submit");
        assert!(Uuid::parse_str(&job_id).is_ok());
        let status = poll(&queue, &job_id);
        assert_eq!(status.status, JobState::Finished);
        assert_eq!(status.result.map(|r| r.json), Some(json!({ "echo": "warrior=x" })));
        assert!(status.finished_at.is_some());
    }

    #[test]
    fn failed_job_reports_runner_error_verbatim() {
        let queue = JobQueue::start(Arc::new(EchoRunner), 1);
        let job_id = queue
            .submit(SimInput {
                simc_text: "explode".to_string(),
                extra_args: Vec::new(),
            })
            .expect("submit");
        let status = poll(&queue, &job_id);
        assert_eq!(status.status, JobState::Failed);
        assert_eq!(status.error.as_deref(), Some("simc rc=3\nbad input"));
    }

    #[test]
    fn terminal_jobs_expire_after_result_ttl() {
        let queue = JobQueue::start(Arc::new(EchoRunner), 1).with_result_ttl(Duration::from_secs(60));
        let finished = queue
            .submit(SimInput {
                simc_text: "warrior=x".to_string(),
                extra_args: Vec::new(),
            })
            .expect("submit");
        let failed = queue
            .submit(SimInput {
                simc_text: "explode".to_string(),
                extra_args: Vec::new(),
            })
            .expect("submit");
        poll(&queue, &finished);
        poll(&queue, &failed);

        assert_eq!(queue.evict_expired_at(Instant::now()), 0);
        assert!(queue.status(&finished).is_ok());

        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(queue.evict_expired_at(later), 2);
        assert!(matches!(queue.status(&finished), Err(JobError::NotFound(_))));
        assert!(matches!(queue.status(&failed), Err(JobError::NotFound(_))));
    }

    #[test]
    fn unfinished_jobs_are_never_evicted() {
        let queue = JobQueue::start(Arc::new(EchoRunner), 1).with_result_ttl(Duration::ZERO);
        queue.jobs.lock().unwrap_or_else(PoisonError::into_inner).insert(
            "pending".to_string(),
            JobEntry {
                status: JobStatus {
                    job_id: "pending".to_string(),
                    status: JobState::Running,
                    result: None,
                    error: None,
                    submitted_at: timestamp(),
                    finished_at: None,
                },
                finished: None,
            },
        );
        assert_eq!(queue.evict_expired_at(Instant::now() + Duration::from_secs(3600)), 0);
        assert_eq!(
            queue.status("pending").map(|status| status.status).ok(),
            Some(JobState::Running)
        );
    }

    #[test]
    fn unknown_job_is_not_found() {
        let queue = JobQueue::start(Arc::new(EchoRunner), 1);
        assert!(matches!(queue.status("nope"), Err(JobError::NotFound(_))));
    }
}
