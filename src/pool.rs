//! Bounded worker pool that renders submitted reports.
//!
//! A [`ReportServer`] owns one dispatcher thread and a fixed number of worker threads.
//! Reports handed to [`ReportServer::submit`] travel through the dispatcher into a queue
//! shared by all workers; whichever worker is idle claims the next report and renders it.
//! [`ReportServer::finish`] ends the submissions, after which the dispatcher enqueues one
//! [`Job::Shutdown`] per worker and waits for one completion from each before reporting.
//!
//! Both channels are rendezvous channels: a send blocks until the other side takes the value.

use std::env;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, error, info};
use thiserror::Error;

use crate::document::Report;
use crate::render::{RenderError, RenderOutput, ReportRenderer};

/// Environment variable holding the number of workers.
pub const WORKERS_ENV: &str = "LATEX_REPORT_WORKERS";

/// What the pool does after a report fails to render.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The first failure is fatal to the batch: reports still queued are skipped and
    /// [`ReportServer::finish`] returns [`PoolError::JobFailed`].
    #[default]
    Abort,
    /// Failures are recorded in the [`PoolSummary`] and the remaining reports are rendered.
    Isolate,
}

/// Size and failure handling of a [`ReportServer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub workers: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl PoolConfig {
    /// Creates a configuration with `workers` threads and the default failure policy.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Sets the failure policy and returns the updated configuration.
    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Reads the worker count from `LATEX_REPORT_WORKERS`, defaulting to one worker.
    pub fn from_env() -> Result<Self, PoolError> {
        match env::var(WORKERS_ENV) {
            Ok(value) if !value.trim().is_empty() => {
                let workers = value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| PoolError::InvalidWorkers(value.clone()))?;
                if workers == 0 {
                    return Err(PoolError::NoWorkers);
                }
                Ok(Self::new(workers))
            }
            _ => Ok(Self::default()),
        }
    }
}

/// Errors raised by the worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("a report pool needs at least one worker")]
    NoWorkers,
    #[error("invalid worker count {0:?}")]
    InvalidWorkers(String),
    #[error("failed to spawn a pool thread")]
    Spawn(#[source] io::Error),
    /// Only finalized reports are accepted.
    #[error("report '{0}' must be finalized before it is submitted")]
    NotFinalized(String),
    /// The dispatcher stopped accepting reports.
    #[error("the report pool is no longer accepting reports")]
    Closed,
    /// A pool thread panicked.
    #[error("a report pool thread panicked")]
    Panicked,
    /// A report failed under [`FailurePolicy::Abort`].
    #[error("rendering report '{report}' failed")]
    JobFailed {
        report: String,
        #[source]
        source: RenderError,
    },
}

/// Item of the queue shared by the workers.
#[derive(Debug)]
pub enum Job {
    Render(Report),
    /// Tells the worker that receives it to stop.
    Shutdown,
}

/// Acknowledgement sent exactly once by each worker when it stops.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerCompletion {
    pub worker: usize,
    pub rendered: usize,
    pub failed: usize,
    /// Reports drawn after an abort and not rendered.
    pub skipped: usize,
}

/// A report that could not be rendered.
#[derive(Debug)]
pub struct JobFailure {
    pub worker: usize,
    pub report: String,
    pub error: RenderError,
}

/// Outcome of a drained pool.
#[derive(Debug, Default)]
pub struct PoolSummary {
    pub workers: usize,
    pub submitted: usize,
    /// Number of [`Job::Shutdown`] items the dispatcher enqueued.
    pub shutdown_signals: usize,
    /// One entry per worker, in the order the workers stopped.
    pub completions: Vec<WorkerCompletion>,
    pub outputs: Vec<RenderOutput>,
    pub failures: Vec<JobFailure>,
}

impl PoolSummary {
    /// Number of reports rendered successfully.
    pub fn rendered(&self) -> usize {
        self.completions.iter().map(|c| c.rendered).sum()
    }

    /// Number of reports skipped after an abort.
    pub fn skipped(&self) -> usize {
        self.completions.iter().map(|c| c.skipped).sum()
    }
}

struct WorkerDone {
    completion: WorkerCompletion,
    outputs: Vec<RenderOutput>,
    failures: Vec<JobFailure>,
}

/// Handle to a running pool.  Dropping it without [`finish`](Self::finish) lets the pool
/// drain in the background.
pub struct ReportServer {
    config: PoolConfig,
    inbound: SyncSender<Report>,
    dispatcher: JoinHandle<Result<PoolSummary, PoolError>>,
}

impl ReportServer {
    /// Spawns the dispatcher and `config.workers` worker threads.
    pub fn start<R>(config: PoolConfig, renderer: R) -> Result<Self, PoolError>
    where
        R: ReportRenderer + 'static,
    {
        if config.workers == 0 {
            return Err(PoolError::NoWorkers);
        }
        info!("Starting report pool with {} worker(s)", config.workers);

        let renderer = Arc::new(renderer);
        let aborted = Arc::new(AtomicBool::new(false));
        let (queue_tx, queue_rx) = mpsc::sync_channel::<Job>(0);
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let (done_tx, done_rx) = mpsc::channel::<WorkerDone>();

        let mut workers = Vec::with_capacity(config.workers);
        for id in 0..config.workers {
            let worker = Worker {
                id,
                policy: config.failure_policy,
                renderer: Arc::clone(&renderer),
                queue: Arc::clone(&queue_rx),
                aborted: Arc::clone(&aborted),
            };
            let done = done_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("report-worker-{id}"))
                .spawn(move || worker.run(done))
                .map_err(PoolError::Spawn)?;
            workers.push(handle);
        }
        // Only the workers may keep the completion channel open.
        drop(done_tx);
        drop(queue_rx);

        let (inbound, inbound_rx) = mpsc::sync_channel::<Report>(0);
        let worker_count = config.workers;
        let dispatcher = thread::Builder::new()
            .name("report-dispatcher".to_owned())
            .spawn(move || dispatch(worker_count, inbound_rx, queue_tx, done_rx, workers))
            .map_err(PoolError::Spawn)?;

        Ok(Self {
            config,
            inbound,
            dispatcher,
        })
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Hands a finalized report to the pool, blocking until the dispatcher accepts it.
    pub fn submit(&self, report: Report) -> Result<(), PoolError> {
        if !report.is_finalized() {
            return Err(PoolError::NotFinalized(report.name().to_owned()));
        }
        debug!("Submitting report '{}'", report.name());
        self.inbound.send(report).map_err(|_| PoolError::Closed)
    }

    /// Ends the submissions and blocks until every worker has stopped.
    pub fn finish(self) -> Result<PoolSummary, PoolError> {
        let Self {
            config,
            inbound,
            dispatcher,
        } = self;
        drop(inbound);

        let mut summary = dispatcher.join().map_err(|_| PoolError::Panicked)??;
        info!(
            "Report pool drained: {} rendered, {} failed, {} skipped",
            summary.rendered(),
            summary.failures.len(),
            summary.skipped()
        );

        if config.failure_policy == FailurePolicy::Abort && !summary.failures.is_empty() {
            let failure = summary.failures.swap_remove(0);
            return Err(PoolError::JobFailed {
                report: failure.report,
                source: failure.error,
            });
        }
        Ok(summary)
    }
}

/// Renders every report in `reports` on a fresh pool and waits for it to drain.
pub fn render_all<R, I>(
    config: PoolConfig,
    renderer: R,
    reports: I,
) -> Result<PoolSummary, PoolError>
where
    R: ReportRenderer + 'static,
    I: IntoIterator<Item = Report>,
{
    let server = ReportServer::start(config, renderer)?;
    for report in reports {
        server.submit(report)?;
    }
    server.finish()
}

fn dispatch(
    workers: usize,
    inbound: Receiver<Report>,
    queue: SyncSender<Job>,
    done: Receiver<WorkerDone>,
    handles: Vec<JoinHandle<()>>,
) -> Result<PoolSummary, PoolError> {
    let mut summary = PoolSummary {
        workers,
        ..PoolSummary::default()
    };

    for report in inbound {
        let name = report.name().to_owned();
        if queue.send(Job::Render(report)).is_err() {
            error!("No worker left to render '{}'", name);
            break;
        }
        debug!("Queued report '{}'", name);
        summary.submitted += 1;
    }

    for _ in 0..workers {
        if queue.send(Job::Shutdown).is_err() {
            break;
        }
        summary.shutdown_signals += 1;
    }

    for _ in 0..workers {
        let Ok(finished) = done.recv() else {
            break;
        };
        debug!("Worker {} stopped", finished.completion.worker);
        summary.completions.push(finished.completion);
        summary.outputs.extend(finished.outputs);
        summary.failures.extend(finished.failures);
    }

    let mut panicked = false;
    for handle in handles {
        panicked |= handle.join().is_err();
    }
    if panicked || summary.completions.len() != workers {
        return Err(PoolError::Panicked);
    }
    Ok(summary)
}

struct Worker<R> {
    id: usize,
    policy: FailurePolicy,
    renderer: Arc<R>,
    queue: Arc<Mutex<Receiver<Job>>>,
    aborted: Arc<AtomicBool>,
}

impl<R: ReportRenderer> Worker<R> {
    fn run(self, done: Sender<WorkerDone>) {
        let mut finished = WorkerDone {
            completion: WorkerCompletion {
                worker: self.id,
                ..WorkerCompletion::default()
            },
            outputs: Vec::new(),
            failures: Vec::new(),
        };

        while let Some(report) = self.next_report() {
            if self.aborted.load(Ordering::SeqCst) {
                debug!("Worker {} skipping '{}' after abort", self.id, report.name());
                finished.completion.skipped += 1;
                continue;
            }

            debug!("Worker {} rendering '{}'", self.id, report.name());
            match self.renderer.render(&report) {
                Ok(output) => {
                    finished.completion.rendered += 1;
                    finished.outputs.push(output);
                }
                Err(err) => {
                    error!(
                        "Worker {} failed to render '{}': {}",
                        self.id,
                        report.name(),
                        err
                    );
                    if self.policy == FailurePolicy::Abort {
                        self.aborted.store(true, Ordering::SeqCst);
                    }
                    finished.completion.failed += 1;
                    finished.failures.push(JobFailure {
                        worker: self.id,
                        report: report.name().to_owned(),
                        error: err,
                    });
                }
            }
        }

        let _ = done.send(finished);
    }

    /// Blocks until the next report arrives; `None` on shutdown.
    fn next_report(&self) -> Option<Report> {
        let job = match self.queue.lock() {
            Ok(queue) => queue.recv(),
            Err(_) => return None,
        };
        match job {
            Ok(Job::Render(report)) => Some(report),
            Ok(Job::Shutdown) | Err(_) => None,
        }
    }
}
