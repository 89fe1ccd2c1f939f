//! Error types used by the bridge.
//!
//! This module defines four enums:
//!
//! - [`BridgeError`]: errors returned by the public bridge API (hub, timers, contexts).
//! - [`NativeError`]: failures reported by a [`NativeCore`](crate::NativeCore) implementation.
//! - [`DispatchError`]: per-subscriber failures during fan-out (always logged, never propagated).
//! - [`RegistryError`]: programmer errors detected by an [`ObserverRegistry`](crate::ObserverRegistry).
//!
//! All of them provide `as_label` for logs, mirroring each other so call sites
//! can record a stable snake_case code next to the human-readable message.

use thiserror::Error;

use crate::executor::ContextId;
use crate::timer::TimerToken;

/// # Errors produced by the bridge API.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The native core rejected a call.
    #[error("native call `{call}` failed: {source}")]
    Native {
        /// Name of the native entry point.
        call: &'static str,
        /// Error returned by the native side.
        #[source]
        source: NativeError,
    },

    /// Timer token was never created or has already been released.
    #[error("unknown timer {0}")]
    UnknownTimer(TimerToken),

    /// Repeating timer was started with a zero period.
    #[error("invalid timer period {period_ms}ms")]
    InvalidPeriod {
        /// The rejected period in milliseconds.
        period_ms: u64,
    },

    /// No execution context is registered under this id.
    #[error("unknown execution context {0}")]
    UnknownContext(ContextId),

    /// The execution context worker has stopped and no longer accepts jobs.
    #[error("execution context {0} is closed")]
    ContextClosed(ContextId),

    /// The object was already released.
    #[error("already released")]
    Released,

    /// Execution contexts did not stop within the configured grace period.
    #[error("shutdown exceeded grace period of {grace:?}")]
    GraceExceeded {
        /// The grace period that was exceeded.
        grace: std::time::Duration,
    },
}

impl BridgeError {
    /// Wraps a native failure together with the entry point name.
    pub fn native(call: &'static str, source: NativeError) -> Self {
        BridgeError::Native { call, source }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use observer_bridge::BridgeError;
    ///
    /// let err = BridgeError::InvalidPeriod { period_ms: 0 };
    /// assert_eq!(err.as_label(), "bridge_invalid_period");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BridgeError::Native { .. } => "bridge_native",
            BridgeError::UnknownTimer(_) => "bridge_unknown_timer",
            BridgeError::InvalidPeriod { .. } => "bridge_invalid_period",
            BridgeError::UnknownContext(_) => "bridge_unknown_context",
            BridgeError::ContextClosed(_) => "bridge_context_closed",
            BridgeError::Released => "bridge_released",
            BridgeError::GraceExceeded { .. } => "bridge_grace_exceeded",
        }
    }
}

/// # Error reported by the native core.
///
/// Carries an implementation-defined status code and message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("native status {code}: {message}")]
pub struct NativeError {
    /// Status code returned by the native side.
    pub code: i32,
    /// Human-readable description.
    pub message: String,
}

impl NativeError {
    /// Creates a new native error.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// # Failure of one subscriber during dispatch.
///
/// Produced while resolving or invoking a method on a single subscriber.
/// Fan-out catches these per subscriber so one failure never suppresses delivery to others.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No method with this name and signature is registered for the subscriber type.
    #[error("no method `{method}{signature}` on {target}")]
    MethodNotFound {
        /// Requested method name.
        method: String,
        /// Rendered signature derived from the argument values.
        signature: String,
        /// Subscriber type name.
        target: &'static str,
    },

    /// An argument could not be extracted as the type the handler asked for.
    #[error("argument {index} expected {expected}, got {actual}")]
    ArgumentMismatch {
        /// Zero-based argument position.
        index: usize,
        /// Type the handler asked for.
        expected: &'static str,
        /// Kind of the value actually passed.
        actual: &'static str,
    },

    /// The handler ran and reported an error.
    #[error("method `{method}` failed: {reason}")]
    Failed {
        /// Method name.
        method: String,
        /// Error text returned by the handler.
        reason: String,
    },

    /// The handler panicked; the panic was caught.
    #[error("method `{method}` panicked: {info}")]
    Panicked {
        /// Method name.
        method: String,
        /// Panic payload rendered as text.
        info: String,
    },
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::MethodNotFound { .. } => "dispatch_method_not_found",
            DispatchError::ArgumentMismatch { .. } => "dispatch_argument_mismatch",
            DispatchError::Failed { .. } => "dispatch_failed",
            DispatchError::Panicked { .. } => "dispatch_panicked",
        }
    }
}

/// # Programmer errors detected by an observer registry.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// The entry is already present as a live slot.
    #[error("observer already registered")]
    Duplicate,
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::Duplicate => "registry_duplicate",
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        let err = BridgeError::native("register_interest", NativeError::new(3, "busy"));
        assert_eq!(err.as_label(), "bridge_native");
        assert!(err.to_string().contains("register_interest"));
        assert_eq!(
            BridgeError::UnknownTimer(TimerToken::from_raw(7)).as_label(),
            "bridge_unknown_timer"
        );
        assert_eq!(RegistryError::Duplicate.as_label(), "registry_duplicate");
    }

    #[test]
    fn panic_payloads_render_as_text() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*boxed), "static");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*boxed), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*boxed), "unknown panic");
    }
}
