//! # Serialized execution contexts.
//!
//! Every externally visible callback (subscriber dispatch, native timer callbacks)
//! surfaces on an [`ExecutionContext`]: a single tokio worker draining a FIFO queue
//! of jobs, so callbacks on one context never run concurrently.
//!
//! ```text
//!  caller threads / timer tasks
//!        │ post(job)      │ post(job)
//!        ▼                ▼
//!   ┌──────────────────────────┐
//!   │  unbounded FIFO queue    │
//!   └────────────┬─────────────┘
//!                ▼
//!         worker task  ──► job()   (panic caught, logged, next job)
//! ```
//!
//! [`ExecutionContexts`] maps [`ContextId`]s to live contexts; [`ContextId::MAIN`]
//! is the designated target for notification fan-out.

mod context;
mod contexts;

pub use context::{ContextId, ExecutionContext, Job};
pub use contexts::ExecutionContexts;
