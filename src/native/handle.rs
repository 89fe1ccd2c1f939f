//! # Exactly-once ownership of a native identifier.
//!
//! [`ResourceHandle`] owns one native id plus its [`ResourceType`] tag.
//! The id is handed back to the native core at most once: either through an
//! explicit [`ResourceHandle::free`] or when the handle is dropped.
//!
//! ## Rules
//! - `free()` on a released handle is a no-op.
//! - Native failures (errors **and** panics) are logged and suppressed; teardown never fails.
//! - Not internally synchronized: `free` takes `&mut self`. Owners that can be torn down
//!   from several threads must route the release through one execution context.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{trace, warn};

use super::{NativeCore, RawHandle, ResourceType};
use crate::error::panic_message;

/// Owner of one native-side identifier.
pub struct ResourceHandle {
    id: Option<RawHandle>,
    kind: ResourceType,
    native: Arc<dyn NativeCore>,
}

impl ResourceHandle {
    /// Takes ownership of `id`.
    pub fn new(id: RawHandle, kind: ResourceType, native: Arc<dyn NativeCore>) -> Self {
        Self {
            id: Some(id),
            kind,
            native,
        }
    }

    /// Returns the native id, or `None` once released.
    #[inline]
    pub fn id(&self) -> Option<RawHandle> {
        self.id
    }

    /// Returns the resource type tag.
    #[inline]
    pub fn resource_type(&self) -> ResourceType {
        self.kind
    }

    /// True after the id has been handed back to the native core.
    #[inline]
    pub fn is_released(&self) -> bool {
        self.id.is_none()
    }

    /// Hands the id back to the native core.
    ///
    /// The id is cleared before the native call, so a panicking deallocator
    /// can never cause a second release.
    pub fn free(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        let tag = self.kind.as_tag();
        let native = &self.native;

        match panic::catch_unwind(AssertUnwindSafe(|| native.native_free(id, tag))) {
            Ok(Ok(())) => {
                trace!(id, tag, "native handle freed");
            }
            Ok(Err(err)) => {
                warn!(id, tag, native = native.name(), error = %err, "native_free failed");
            }
            Err(payload) => {
                warn!(
                    id,
                    tag,
                    native = native.name(),
                    panic = %panic_message(&*payload),
                    "native_free panicked"
                );
            }
        }
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        self.free();
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}
