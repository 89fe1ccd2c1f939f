//! # Subscriber trait.
//!
//! Provides [`Subscriber`], the extension point every observer implements so that
//! fan-out can call a method by name with a list of [`Value`] arguments.
//!
//! Most types implement [`Observe`] instead and describe their callable surface
//! once, in a `'static` [`MethodTable`]; a blanket impl turns every `Observe`
//! type into a `Subscriber`.
//!
//! ## Rules
//! - `invoke` runs on whichever execution context the fan-out targets.
//! - Return an error rather than panicking; panics are caught anyway and logged
//!   as [`DispatchError::Panicked`].
//! - A failing subscriber never prevents delivery to the others.
//!
//! ## Example
//! ```rust
//! use std::sync::LazyLock;
//! use observer_bridge::{MethodTable, Observe, Subscriber, Value};
//!
//! struct Printer;
//!
//! impl Observe for Printer {
//!     fn methods() -> &'static MethodTable<Self> {
//!         static TABLE: LazyLock<MethodTable<Printer>> = LazyLock::new(|| {
//!             MethodTable::new().method2("onObserve", |_: &Printer, ty: i32, info: Value| {
//!                 println!("type {ty}: {info:?}");
//!                 Ok(())
//!             })
//!         });
//!         &TABLE
//!     }
//! }
//!
//! Printer.invoke("onObserve", &[Value::Int(3), Value::Null]).unwrap();
//! ```

use super::method::MethodTable;
use super::value::Value;
use crate::error::DispatchError;

/// Object that can receive name-dispatched calls.
pub trait Subscriber: Send + Sync + 'static {
    /// Invokes `method` with `args`.
    fn invoke(&self, method: &str, args: &[Value]) -> Result<(), DispatchError>;

    /// Returns the subscriber name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Static description of a subscriber type's callable methods.
pub trait Observe: Send + Sync + Sized + 'static {
    /// Returns the shared method table for this type.
    fn methods() -> &'static MethodTable<Self>;
}

impl<T: Observe> Subscriber for T {
    fn invoke(&self, method: &str, args: &[Value]) -> Result<(), DispatchError> {
        T::methods().invoke(self, method, args)
    }
}
