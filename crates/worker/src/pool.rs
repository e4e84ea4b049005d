//! Bounded-concurrency executor for job execution units.
//!
//! A fixed number of workers pull units from one bounded FIFO queue, so
//! at most `workers` units run concurrently system-wide and at most
//! `queue_capacity` submissions can be waiting. Capacity is reserved
//! *before* a submission is built ([`JobSubmitter::try_reserve`]), which
//! lets callers reject work with an explicit "try later" signal instead
//! of queueing unboundedly.
//!
//! A unit that panics is caught at the worker boundary; the worker logs
//! the fault, reports it through the unit's [`CompletionHandle`], and
//! keeps serving the queue.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tutorgen_core::error::CoreError;

/// Default number of concurrently running execution units.
pub const DEFAULT_WORKER_COUNT: usize = 3;

/// Default bound on queued (not yet running) submissions.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// The future a worker drives for one job.
///
/// The unit is expected to contain its own faults and persist the job's
/// terminal state itself; its return value only reports whether it was
/// able to do so, for logging and shutdown accounting.
pub type UnitFuture = BoxFuture<'static, Result<(), CoreError>>;

/// Sizing for a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKER_COUNT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Submission-side failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PoolError {
    /// The queue is at capacity. The caller should retry later.
    #[error("Worker queue is full, try again later")]
    QueueFull,

    /// The pool has been shut down and accepts no further work.
    #[error("Worker pool is shut down")]
    Closed,
}

struct Submission {
    label: String,
    unit: UnitFuture,
    done: oneshot::Sender<Result<(), CoreError>>,
}

/// Bounded-concurrency worker pool.
///
/// Owns the worker tasks. Handlers interact with it through the
/// cheaply-cloneable [`JobSubmitter`]; the pool itself stays with the
/// process entrypoint so shutdown is explicit.
pub struct WorkerPool {
    tx: mpsc::Sender<Submission>,
    workers: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
    worker_count: usize,
}

impl WorkerPool {
    /// Spawn the worker tasks and return the pool.
    pub fn start(config: WorkerPoolConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Submission>(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let shutdown = CancellationToken::new();

        let workers = (0..config.workers.max(1))
            .map(|index| spawn_worker(index, Arc::clone(&rx), shutdown.clone()))
            .collect::<Vec<_>>();

        tracing::info!(
            workers = workers.len(),
            queue_capacity = config.queue_capacity.max(1),
            "Worker pool started"
        );

        Self {
            tx,
            worker_count: workers.len(),
            workers,
            shutdown,
        }
    }

    /// Maximum number of concurrently running units.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Handle for submitting execution units to this pool.
    pub fn submitter(&self) -> JobSubmitter {
        JobSubmitter {
            tx: self.tx.clone(),
        }
    }

    /// Stop accepting work and wait up to `grace` for in-flight units.
    ///
    /// Units still queued when shutdown begins are abandoned: their
    /// completion handles resolve with an error rather than silently
    /// disappearing. Workers that outlive the grace period are aborted.
    pub async fn shutdown(self, grace: Duration) {
        let Self {
            tx,
            mut workers,
            shutdown,
            worker_count,
        } = self;

        shutdown.cancel();
        drop(tx);

        let drain = futures::future::join_all(workers.iter_mut());
        if tokio::time::timeout(grace, drain).await.is_err() {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "Worker pool did not drain within the grace period; aborting in-flight units"
            );
            for handle in &workers {
                handle.abort();
            }
        }

        tracing::info!(workers = worker_count, "Worker pool stopped");
    }
}

/// Cloneable submission handle for a [`WorkerPool`].
#[derive(Clone)]
pub struct JobSubmitter {
    tx: mpsc::Sender<Submission>,
}

impl JobSubmitter {
    /// Reserve one queue slot, failing fast when the pool is saturated.
    ///
    /// Reserving before creating any job record means a rejected
    /// submission leaves no half-created state behind.
    pub fn try_reserve(&self) -> Result<SubmitPermit, PoolError> {
        match self.tx.clone().try_reserve_owned() {
            Ok(permit) => Ok(SubmitPermit { permit }),
            Err(TrySendError::Full(_)) => Err(PoolError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(PoolError::Closed),
        }
    }
}

/// A reserved queue slot. Consumed by [`SubmitPermit::submit`].
pub struct SubmitPermit {
    permit: mpsc::OwnedPermit<Submission>,
}

impl SubmitPermit {
    /// Enqueue an execution unit into the reserved slot.
    ///
    /// `label` identifies the unit in logs (typically `job-{id}`).
    pub fn submit(self, label: impl Into<String>, unit: UnitFuture) -> CompletionHandle {
        let (done_tx, done_rx) = oneshot::channel();
        self.permit.send(Submission {
            label: label.into(),
            unit,
            done: done_tx,
        });
        CompletionHandle { rx: done_rx }
    }
}

/// Observes the outcome of one submitted execution unit.
pub struct CompletionHandle {
    rx: oneshot::Receiver<Result<(), CoreError>>,
}

impl CompletionHandle {
    /// Wait for the unit to finish.
    ///
    /// Resolves with an error if the unit reported a fault or if the
    /// pool abandoned the unit during shutdown before running it.
    pub async fn wait(self) -> Result<(), CoreError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(CoreError::Internal(
                "Execution unit was abandoned before completion".to_string(),
            )),
        }
    }
}

fn spawn_worker(
    index: usize,
    queue: Arc<Mutex<mpsc::Receiver<Submission>>>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let submission = tokio::select! {
                _ = shutdown.cancelled() => None,
                submission = next_submission(&queue) => submission,
            };
            let Some(submission) = submission else { break };

            tracing::debug!(worker = index, unit = %submission.label, "Execution unit started");

            let outcome = AssertUnwindSafe(submission.unit).catch_unwind().await;
            let result = match outcome {
                Ok(result) => result,
                Err(panic) => Err(CoreError::Internal(format!(
                    "Execution unit panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            };

            match &result {
                Ok(()) => {
                    tracing::debug!(worker = index, unit = %submission.label, "Execution unit finished");
                }
                Err(error) => {
                    tracing::error!(worker = index, unit = %submission.label, %error, "Execution unit failed");
                }
            }

            // The submitter may have dropped its handle; that is fine.
            let _ = submission.done.send(result);
        }
        tracing::debug!(worker = index, "Worker stopped");
    })
}

/// Pull the next submission off the shared queue.
///
/// The receiver lock is held across the `recv` await, which serialises
/// pickup (preserving FIFO order) without limiting how many units run
/// at once: a worker releases the lock as soon as it has a unit in hand.
async fn next_submission(queue: &Arc<Mutex<mpsc::Receiver<Submission>>>) -> Option<Submission> {
    queue.lock().await.recv().await
}

/// Best-effort extraction of a panic payload message.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}
