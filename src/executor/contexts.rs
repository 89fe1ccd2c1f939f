//! # Registry of live execution contexts.
//!
//! Owns the worker join handles so shutdown can wait for every context to stop.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{ContextId, ExecutionContext};
use crate::error::BridgeError;

/// Thread-safe map of [`ContextId`] → [`ExecutionContext`].
pub struct ExecutionContexts {
    main: ExecutionContext,
    contexts: RwLock<HashMap<ContextId, ExecutionContext>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicU32,
    root: CancellationToken,
}

impl ExecutionContexts {
    /// Creates the registry and spawns the main context.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(main_name: impl Into<Arc<str>>, root: CancellationToken) -> Arc<Self> {
        let (main, join) = ExecutionContext::spawn(ContextId::MAIN, main_name, &root);
        let mut contexts = HashMap::new();
        contexts.insert(ContextId::MAIN, main.clone());

        Arc::new(Self {
            main,
            contexts: RwLock::new(contexts),
            workers: Mutex::new(vec![join]),
            next_id: AtomicU32::new(1),
            root,
        })
    }

    /// Spawns an additional context with a fresh id.
    pub fn spawn(&self, name: impl Into<Arc<str>>) -> ExecutionContext {
        let id = ContextId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (ctx, join) = ExecutionContext::spawn(id, name, &self.root);
        self.contexts.write().insert(id, ctx.clone());
        self.workers.lock().push(join);
        ctx
    }

    /// Returns the main context.
    pub fn main(&self) -> &ExecutionContext {
        &self.main
    }

    /// Looks up a context by id.
    pub fn get(&self, id: ContextId) -> Result<ExecutionContext, BridgeError> {
        self.contexts
            .read()
            .get(&id)
            .cloned()
            .ok_or(BridgeError::UnknownContext(id))
    }

    /// Closes and forgets a non-main context.
    pub fn remove(&self, id: ContextId) -> Option<ExecutionContext> {
        if id == ContextId::MAIN {
            return None;
        }
        let ctx = self.contexts.write().remove(&id)?;
        ctx.close();
        Some(ctx)
    }

    /// Returns the sorted ids of all registered contexts.
    pub fn ids(&self) -> Vec<ContextId> {
        let mut ids: Vec<ContextId> = self.contexts.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Closes every context and waits up to `grace` for the workers to stop.
    ///
    /// Returns `true` when all workers exited in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.root.cancel();
        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());

        let all = async {
            for w in workers {
                if let Err(err) = w.await {
                    warn!(error = %err, "execution context worker ended abnormally");
                }
            }
        };
        if grace.is_zero() {
            return true;
        }
        match tokio::time::timeout(grace, all).await {
            Ok(()) => true,
            Err(_) => {
                warn!(?grace, "execution contexts did not stop within grace");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn main_context_always_present() {
        let contexts = ExecutionContexts::new("main", CancellationToken::new());
        assert_eq!(contexts.main().id(), ContextId::MAIN);
        assert_eq!(contexts.ids(), vec![ContextId::MAIN]);
        assert!(contexts.remove(ContextId::MAIN).is_none());
    }

    #[tokio::test]
    async fn spawned_contexts_get_fresh_ids() {
        let contexts = ExecutionContexts::new("main", CancellationToken::new());
        let a = contexts.spawn("a");
        let b = contexts.spawn("b");

        assert_ne!(a.id(), b.id());
        assert_eq!(contexts.get(a.id()).unwrap().name(), "a");

        contexts.remove(a.id());
        assert!(a.is_closed());
        assert!(matches!(
            contexts.get(a.id()),
            Err(BridgeError::UnknownContext(_))
        ));
    }

    #[tokio::test]
    async fn shutdown_stops_all_workers() {
        let contexts = ExecutionContexts::new("main", CancellationToken::new());
        let extra = contexts.spawn("extra");

        assert!(contexts.shutdown(Duration::from_secs(1)).await);
        assert!(contexts.main().is_closed());
        assert!(extra.is_closed());
    }
}
