//! Bounded-Concurrency Work Queue
//!
//! A small scheduler for asynchronous client jobs: at most `workers` jobs run
//! at once, pending jobs wait in two FIFO tiers, and a high-priority
//! submission jumps ahead of every pending normal job without ever preempting
//! a job that is already running.
//!
//! # Design Philosophy
//!
//! The queue exists to keep a surface responsive while bounding how many
//! network operations are in flight: per-day refreshes typically run through
//! a queue with a single worker so updates to the same backing data are
//! strictly serialized, while user-triggered actions are submitted with
//! [`Priority::High`] so they start before any backlog of passive refreshes.
//!
//! The queue owns scheduling and nothing else. Job results are reported back
//! through the [`JobHandle`] returned from [`WorkQueue::submit`]; the queue
//! itself never logs, rethrows, or interprets a job failure beyond freeing
//! the worker slot, so one failing job can never wedge the jobs behind it.
//!
//! There is deliberately no cancellation, timeout, or retry here. A job that
//! has started runs to settlement; consumers that need deadlines impose them
//! inside the job body at the I/O layer they own.
//!
//! # Usage
//!
//! ```no_run
//! use tracksync_core::scheduler::{Priority, SchedulerConfig, WorkQueue};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let queue = WorkQueue::new(SchedulerConfig::new().with_workers(1))?;
//!
//! let handle = queue.submit(
//!     async {
//!         // ... perform a network call ...
//!         Ok(())
//!     },
//!     Priority::Normal,
//! );
//!
//! let outcome = handle.outcome().await;
//! assert!(outcome.is_success());
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;

/// A queued unit of work: any future that settles with `Ok` or `Err`.
type BoxedJob = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for [`WorkQueue`].
#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    /// Maximum number of jobs allowed to execute concurrently.
    ///
    /// Must be at least 1. The typical value is 1, which serializes all
    /// submitted jobs while still letting high-priority submissions jump
    /// the pending line.
    pub workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

impl SchedulerConfig {
    /// Create a configuration with default values (a single worker).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker count.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// Errors from queue construction.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The configured worker count was zero.
    #[error("worker count must be at least 1")]
    ZeroWorkers,
}

// =============================================================================
// Job Types
// =============================================================================

/// Submission priority tier.
///
/// Priority affects queue position only: a [`Priority::High`] job starts
/// before every pending [`Priority::Normal`] job, but a job that is already
/// running is never preempted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Default tier, FIFO among normal submissions.
    #[default]
    Normal,
    /// Jump-the-line tier, FIFO among high submissions.
    High,
}

/// Settlement outcome of one job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job's future resolved with `Ok`.
    Success,
    /// The job's future resolved with `Err`, panicked, or was torn down
    /// with the runtime; carries the failure rendered as text.
    Failure(String),
}

impl JobOutcome {
    /// Whether the job settled successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Handle to a submitted job.
///
/// Awaiting [`JobHandle::outcome`] yields the job's settlement. Dropping the
/// handle detaches the job: it still runs to settlement, its outcome is
/// simply discarded.
#[derive(Debug)]
pub struct JobHandle {
    rx: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    /// Wait for the job to settle.
    pub async fn outcome(self) -> JobOutcome {
        // The sender only disappears without settling if the runtime is torn
        // down while the job is mid-flight.
        self.rx
            .await
            .unwrap_or_else(|_| JobOutcome::Failure("job terminated abnormally".to_string()))
    }
}

// =============================================================================
// Queue
// =============================================================================

struct QueuedJob {
    future: BoxedJob,
    settled: oneshot::Sender<JobOutcome>,
}

#[derive(Default)]
struct QueueState {
    high: VecDeque<QueuedJob>,
    normal: VecDeque<QueuedJob>,
    running: usize,
}

struct Inner {
    workers: usize,
    state: Mutex<QueueState>,
}

/// A concurrency-bounded scheduler for asynchronous jobs.
///
/// Cloning is cheap and every clone submits into the same queue. Construct
/// one queue per session and hand clones to whichever components submit
/// work; there is intentionally no global instance.
///
/// Invariants, for any sequence of submissions:
/// - at most `workers` jobs are running at any time;
/// - a free slot always starts the oldest pending high-priority job, and a
///   normal job only when no high-priority job is pending;
/// - within a tier, jobs start in submission order.
///
/// Requires an ambient tokio runtime: jobs execute on [`tokio::spawn`]-ed
/// tasks, never inline in the caller.
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<Inner>,
}

impl WorkQueue {
    /// Create a queue with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ZeroWorkers`] if `config.workers` is zero.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        if config.workers == 0 {
            return Err(SchedulerError::ZeroWorkers);
        }
        Ok(Self {
            inner: Arc::new(Inner {
                workers: config.workers,
                state: Mutex::new(QueueState::default()),
            }),
        })
    }

    /// Submit a job.
    ///
    /// The job is appended to the pending list of its tier and started as
    /// soon as a worker slot is free, honoring priority order. This call
    /// never blocks and never runs the job inline.
    ///
    /// The queue observes the job's settlement only to free its worker slot;
    /// the result itself is delivered through the returned [`JobHandle`].
    /// Jobs that need to surface errors elsewhere (a status field, an event
    /// channel) are expected to capture them in their own body.
    pub fn submit<F>(&self, job: F, priority: Priority) -> JobHandle
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.inner.state.lock();
            let queued = QueuedJob {
                future: Box::pin(job),
                settled: tx,
            };
            match priority {
                Priority::High => state.high.push_back(queued),
                Priority::Normal => state.normal.push_back(queued),
            }
        }
        Inner::pump(&self.inner);
        JobHandle { rx }
    }

    /// The configured worker count.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.inner.workers
    }

    /// Number of jobs currently running.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.inner.state.lock().running
    }

    /// Number of jobs waiting to start, across both tiers.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        let state = self.inner.state.lock();
        state.high.len() + state.normal.len()
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("WorkQueue")
            .field("workers", &self.inner.workers)
            .field("running", &state.running)
            .field("pending_high", &state.high.len())
            .field("pending_normal", &state.normal.len())
            .finish()
    }
}

impl Inner {
    /// Start pending jobs until every worker slot is occupied or nothing is
    /// pending. High tier drains first; both tiers are FIFO.
    fn pump(inner: &Arc<Inner>) {
        loop {
            let job = {
                let mut state = inner.state.lock();
                if state.running >= inner.workers {
                    return;
                }
                let Some(job) = state.high.pop_front().or_else(|| state.normal.pop_front())
                else {
                    return;
                };
                state.running += 1;
                job
            };

            // The lock is released before spawning; the guard frees the slot
            // when the task ends, whether the job settles, panics, or the
            // task is aborted.
            let guard = SlotGuard {
                inner: Arc::clone(inner),
            };
            tokio::spawn(async move {
                let _guard = guard;
                let outcome = match job.future.await {
                    Ok(()) => JobOutcome::Success,
                    Err(err) => JobOutcome::Failure(err.to_string()),
                };
                tracing::debug!(success = outcome.is_success(), "job settled");
                let _ = job.settled.send(outcome);
            });
        }
    }
}

/// Frees one worker slot and re-runs scheduling when the owning task ends.
struct SlotGuard {
    inner: Arc<Inner>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.inner.state.lock().running -= 1;
        Inner::pump(&self.inner);
    }
}

// =============================================================================
// Tests
// =============================================================================
