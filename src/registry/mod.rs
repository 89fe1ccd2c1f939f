//! Iteration-safe observer storage.
//!
//! ## Contents
//! - [`ObserverRegistry`] ordered slots with tombstoning and deferred compaction
//! - [`Iter`] rewindable iterator that pins the registry's iteration depth
//!
//! ```text
//! slots:  [ A ][ B ][ C ]           depth = 0
//! iter() ──────────────────────────► depth = 1, end marker = 3
//! remove(B) while iterating:
//! slots:  [ A ][ ✝ ][ C ]           tombstone, indices stay valid
//! iterator exhausted / dropped ────► depth = 0 → compact
//! slots:  [ A ][ C ]
//! ```

mod list;

pub use list::{Iter, ObserverRegistry};
