//! # Typed notification routing.
//!
//! [`NotificationHub`] keeps one [`WeakSubscriberSet`](crate::WeakSubscriberSet) per
//! [`NotificationType`] and mirrors the set of non-empty types to the native core:
//!
//! ```text
//! subscribe(3, A)  ─► first for 3 ─► native.register_interest(3)
//! subscribe(3, B)  ─► already registered
//! native event 3   ─► on_native_event ─► set[3].notify("onObserve", [Int(3), payload])
//! unsubscribe(3,A) ─► B remains
//! unsubscribe(3,B) ─► set empty ─► native.unregister_interest(3), entry dropped
//! ```

mod hub;

pub use hub::NotificationHub;

use std::fmt;

/// Integer identifier of a notification category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationType(i32);

impl NotificationType {
    /// Wraps a raw type code.
    #[inline]
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    /// Returns the raw type code.
    #[inline]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for NotificationType {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
