//! Recording native core used by unit tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::time::Instant;

use super::{CallbackRef, NativeCore, RawHandle};
use crate::error::NativeError;
use crate::executor::{ContextId, ExecutionContext};
use crate::notify::NotificationType;
use crate::subscribers::Value;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum NativeCall {
    Allocate(RawHandle),
    Register(i32),
    Unregister(i32),
    Post(i32, Value),
    TimerCall {
        callback: CallbackRef,
        context: ContextId,
        ran_on: Option<ContextId>,
    },
    Free {
        id: RawHandle,
        tag: u32,
    },
}

#[derive(Default)]
pub(crate) struct MockNative {
    calls: Mutex<Vec<NativeCall>>,
    fires: Mutex<Vec<(CallbackRef, Instant)>>,
    next_handle: AtomicU64,
    failing_register: Mutex<HashSet<i32>>,
    failing_unregister: Mutex<HashSet<i32>>,
    fail_free: AtomicBool,
    panic_on_free: AtomicBool,
}

impl MockNative {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            next_handle: AtomicU64::new(100),
            ..Self::default()
        })
    }

    pub(crate) fn calls(&self) -> Vec<NativeCall> {
        self.calls.lock().clone()
    }

    pub(crate) fn count(&self, pred: impl Fn(&NativeCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub(crate) fn fires(&self) -> Vec<(CallbackRef, Instant)> {
        self.fires.lock().clone()
    }

    pub(crate) fn fail_register(&self, ty: i32) {
        self.failing_register.lock().insert(ty);
    }

    pub(crate) fn fail_unregister(&self, ty: i32) {
        self.failing_unregister.lock().insert(ty);
    }

    pub(crate) fn fail_free(&self, on: bool) {
        self.fail_free.store(on, Ordering::SeqCst);
    }

    pub(crate) fn panic_on_free(&self, on: bool) {
        self.panic_on_free.store(on, Ordering::SeqCst);
    }

    fn record(&self, call: NativeCall) {
        self.calls.lock().push(call);
    }
}

impl NativeCore for MockNative {
    fn allocate_listener(&self) -> Result<RawHandle, NativeError> {
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.record(NativeCall::Allocate(id));
        Ok(id)
    }

    fn register_interest(&self, ty: NotificationType) -> Result<(), NativeError> {
        self.record(NativeCall::Register(ty.get()));
        if self.failing_register.lock().contains(&ty.get()) {
            return Err(NativeError::new(-1, "register rejected"));
        }
        Ok(())
    }

    fn unregister_interest(&self, ty: NotificationType) -> Result<(), NativeError> {
        self.record(NativeCall::Unregister(ty.get()));
        if self.failing_unregister.lock().contains(&ty.get()) {
            return Err(NativeError::new(-2, "unregister rejected"));
        }
        Ok(())
    }

    fn post_notification(&self, ty: NotificationType, payload: &Value) -> Result<(), NativeError> {
        self.record(NativeCall::Post(ty.get(), payload.clone()));
        Ok(())
    }

    fn timer_call(&self, callback: CallbackRef, context: ContextId) {
        self.fires.lock().push((callback, Instant::now()));
        self.record(NativeCall::TimerCall {
            callback,
            context,
            ran_on: ExecutionContext::current(),
        });
    }

    fn native_free(&self, id: RawHandle, tag: u32) -> Result<(), NativeError> {
        self.record(NativeCall::Free { id, tag });
        if self.panic_on_free.load(Ordering::SeqCst) {
            panic!("native_free exploded");
        }
        if self.fail_free.load(Ordering::SeqCst) {
            return Err(NativeError::new(-3, "free rejected"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
