//! # Demo: timer
//!
//! Runs a repeating timer on a worker context, stops it, and shows that a fire
//! arriving after `release` never reaches the native callback.
//!
//! ## Flow
//! ```text
//! create_timer ─► bind(cb, worker) ─► start(Repeating, 100ms)
//!   tick 0ms, 100ms, 200ms ... ─► [worker ctx] ─► ConsoleCore.timer_call(cb)
//! stop ─► no more ticks, binding kept
//! release ─► deliver_timer_fire(token) is dropped
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=observer_bridge=trace cargo run --example timer
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use observer_bridge::{
    Bridge, BridgeConfig, CallbackRef, ContextId, ExecutionContext, NativeCore, NativeError,
    NotificationType, RawHandle, TimerMode, Value,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Default)]
struct ConsoleCore {
    calls: AtomicUsize,
}

impl NativeCore for ConsoleCore {
    fn allocate_listener(&self) -> Result<RawHandle, NativeError> {
        Ok(1)
    }

    fn register_interest(&self, _: NotificationType) -> Result<(), NativeError> {
        Ok(())
    }

    fn unregister_interest(&self, _: NotificationType) -> Result<(), NativeError> {
        Ok(())
    }

    fn post_notification(&self, _: NotificationType, _: &Value) -> Result<(), NativeError> {
        Ok(())
    }

    fn timer_call(&self, callback: CallbackRef, context: ContextId) {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        println!(
            "[native] {callback} call #{n} on {context} (running on {:?})",
            ExecutionContext::current()
        );
    }

    fn native_free(&self, _: RawHandle, _: u32) -> Result<(), NativeError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let core = Arc::new(ConsoleCore::default());
    let bridge = Bridge::builder(BridgeConfig::default(), core.clone()).build()?;
    let worker = bridge.spawn_context("worker");
    let timers = bridge.timers();

    let token = timers.create_timer();
    timers.bind(token, CallbackRef(0xbeef), worker.id())?;
    timers.start(token, TimerMode::Repeating, Duration::from_millis(100))?;
    tokio::time::sleep(Duration::from_millis(350)).await;

    timers.stop(token)?;
    let after_stop = core.calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(250)).await;
    println!(
        "calls after stop: {} (was {after_stop})",
        core.calls.load(Ordering::SeqCst)
    );

    timers.release(token)?;
    bridge.deliver_timer_fire(token);
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("calls after release: {}", core.calls.load(Ordering::SeqCst));

    bridge.shutdown().await?;
    Ok(())
}
