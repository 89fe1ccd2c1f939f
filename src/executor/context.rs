//! # ExecutionContext: one serialized job queue.
//!
//! ## Rules
//! - Jobs run in post order (FIFO), one at a time.
//! - A panicking job is caught and logged; the worker continues with the next job.
//! - `post` never blocks; the queue is unbounded.
//! - After [`ExecutionContext::close`] (or cancellation of the parent token) the worker
//!   drains nothing further and `post` returns [`BridgeError::ContextClosed`].

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{BridgeError, panic_message};

/// Boxed unit of work posted to a context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

tokio::task_local! {
    static CURRENT: ContextId;
}

/// Identifier of an execution context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u32);

impl ContextId {
    /// The designated main context.
    pub const MAIN: ContextId = ContextId(0);
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Cloneable handle to a serialized job queue.
#[derive(Clone)]
pub struct ExecutionContext {
    id: ContextId,
    name: Arc<str>,
    tx: mpsc::UnboundedSender<Job>,
    stop: CancellationToken,
}

impl ExecutionContext {
    /// Spawns the worker task and returns the handle plus its join handle.
    ///
    /// The worker stops when `parent` (or the context's own token) is cancelled,
    /// or when every handle has been dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        id: ContextId,
        name: impl Into<Arc<str>>,
        parent: &CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let name: Arc<str> = name.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let stop = parent.child_token();

        let worker_stop = stop.clone();
        let worker_name = Arc::clone(&name);
        let handle = tokio::spawn(CURRENT.scope(id, async move {
            debug!(context = %id, name = %worker_name, "execution context started");
            loop {
                tokio::select! {
                    biased;
                    _ = worker_stop.cancelled() => break,
                    job = rx.recv() => match job {
                        Some(job) => run_job(id, &worker_name, job),
                        None => break,
                    }
                }
            }
            rx.close();
            debug!(context = %id, name = %worker_name, "execution context stopped");
        }));

        (Self { id, name, tx, stop }, handle)
    }

    /// Returns the context id.
    #[inline]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Returns the context name used in logs.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueues `job`; returns immediately.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> Result<(), BridgeError> {
        if self.stop.is_cancelled() {
            return Err(BridgeError::ContextClosed(self.id));
        }
        self.tx
            .send(Box::new(job))
            .map_err(|_| BridgeError::ContextClosed(self.id))
    }

    /// Runs `job` inline when already on this context, otherwise posts it.
    pub fn post_or_run(&self, job: impl FnOnce() + Send + 'static) -> Result<(), BridgeError> {
        if self.is_current() {
            run_job(self.id, &self.name, Box::new(job));
            Ok(())
        } else {
            self.post(job)
        }
    }

    /// True when called from a job running on this context.
    pub fn is_current(&self) -> bool {
        Self::current() == Some(self.id)
    }

    /// Returns the id of the context the caller is running on, if any.
    pub fn current() -> Option<ContextId> {
        CURRENT.try_with(|id| *id).ok()
    }

    /// Stops the worker; jobs still queued are dropped without running.
    pub fn close(&self) {
        self.stop.cancel();
    }

    /// True once the context no longer accepts jobs.
    pub fn is_closed(&self) -> bool {
        self.stop.is_cancelled() || self.tx.is_closed()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

fn run_job(id: ContextId, name: &str, job: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        warn!(
            context = %id,
            name,
            panic = %panic_message(&*payload),
            "job panicked on execution context"
        );
    }
}
