//! Bounded worker pool executing store operations off the caller's thread.
//!
//! Every public store operation is an independently scheduled unit of work:
//! submission enqueues a boxed job and returns immediately with a one-shot
//! completion signal; a fixed set of worker tasks drains the queue and runs
//! each job to completion. The signal resolves exactly once with the
//! operation's `Result`; the async form awaits it and the blocking form
//! parks on it. Worker count is the bound; the queue itself is unbounded and
//! carries no cancellation or timeout.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

use crate::error::StoreError;

/// Default number of worker tasks for a store.
pub(crate) const DEFAULT_WORKERS: usize = 4;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to the worker pool. Cheap to clone; dropping the last handle
/// closes the queue and the workers drain and exit.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    queue: mpsc::UnboundedSender<Job>,
}

impl Dispatcher {
    /// Spawns `workers` tasks (at least one) onto the current tokio runtime.
    pub(crate) fn new(workers: usize) -> Self {
        let (queue, receiver) = mpsc::unbounded_channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        for worker in 0..workers.max(1) {
            let receiver = Arc::clone(&receiver);
            tokio::spawn(async move {
                loop {
                    // Hold the queue lock only while idle; it is released
                    // before the job runs so other workers keep draining.
                    let job = { receiver.lock().await.recv().await };
                    match job {
                        Some(job) => job(),
                        None => break,
                    }
                }
                debug!(worker, "store worker stopped");
            });
        }

        Self { queue }
    }

    /// Submits one operation and returns its completion signal.
    ///
    /// The returned receiver resolves exactly once. If the pool is gone the
    /// job is dropped and the receiver yields a channel error, which the
    /// store surfaces as [`StoreError::ShuttingDown`].
    pub(crate) fn submit<R, F>(&self, op: F) -> oneshot::Receiver<Result<R, StoreError>>
    where
        R: Send + 'static,
        F: FnOnce() -> Result<R, StoreError> + Send + 'static,
    {
        let (done, outcome) = oneshot::channel();
        let job: Job = Box::new(move || {
            // The caller may have stopped waiting; a send failure is fine.
            let _ = done.send(op());
        });
        let _ = self.queue.send(job);
        outcome
    }
}
