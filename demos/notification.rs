//! # Demo: notification
//!
//! Subscribes two observers to a notification type, fires native events at them,
//! and shows that a dropped observer stops receiving without unsubscribing.
//!
//! ## Flow
//! ```text
//! hub.subscribe(3, screen) ──► ConsoleCore.register_interest(3)
//! hub.subscribe(3, badge)
//! bridge.deliver_event(3, "login") ──► [main ctx] ──► screen.onObserve, badge.onObserve
//! drop(badge)
//! bridge.deliver_event(3, "logout") ──► [main ctx] ──► screen.onObserve
//! hub.unsubscribe(3, screen) ──► ConsoleCore.unregister_interest(3)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=observer_bridge=debug cargo run --example notification
//! ```

use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use observer_bridge::{
    Bridge, BridgeConfig, CallbackRef, ContextId, MethodTable, NativeCore, NativeError,
    NotificationType, Observe, RawHandle, Subscriber, Value,
};
use parking_lot::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Native stand-in that prints every call it receives.
#[derive(Default)]
struct ConsoleCore {
    interest: Mutex<BTreeSet<i32>>,
}

impl NativeCore for ConsoleCore {
    fn allocate_listener(&self) -> Result<RawHandle, NativeError> {
        println!("[native] allocate listener");
        Ok(1)
    }

    fn register_interest(&self, ty: NotificationType) -> Result<(), NativeError> {
        self.interest.lock().insert(ty.get());
        println!("[native] interest: {:?}", self.interest.lock());
        Ok(())
    }

    fn unregister_interest(&self, ty: NotificationType) -> Result<(), NativeError> {
        self.interest.lock().remove(&ty.get());
        println!("[native] interest: {:?}", self.interest.lock());
        Ok(())
    }

    fn post_notification(&self, ty: NotificationType, payload: &Value) -> Result<(), NativeError> {
        println!("[native] received type={ty} payload={payload:?}");
        Ok(())
    }

    fn timer_call(&self, _callback: CallbackRef, _context: ContextId) {}

    fn native_free(&self, id: RawHandle, tag: u32) -> Result<(), NativeError> {
        println!("[native] free id={id} tag={tag}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

struct Observer {
    label: &'static str,
}

impl Observe for Observer {
    fn methods() -> &'static MethodTable<Self> {
        static TABLE: LazyLock<MethodTable<Observer>> = LazyLock::new(|| {
            MethodTable::new().method2("onObserve", |o: &Observer, ty: i32, info: Value| {
                println!("[{}] type={ty} info={info:?}", o.label);
                Ok(())
            })
        });
        &TABLE
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let core = Arc::new(ConsoleCore::default());
    let bridge = Bridge::builder(BridgeConfig::default(), core).build()?;
    let hub = bridge.hub();
    let login = NotificationType::new(3);

    let screen: Arc<dyn Subscriber> = Arc::new(Observer { label: "screen" });
    let badge: Arc<dyn Subscriber> = Arc::new(Observer { label: "badge" });
    hub.subscribe(login, &screen)?;
    hub.subscribe(login, &badge)?;

    bridge.deliver_event(login, Value::from("login"));
    tokio::time::sleep(Duration::from_millis(10)).await;

    drop(badge);
    bridge.deliver_event(login, Value::from("logout"));
    tokio::time::sleep(Duration::from_millis(10)).await;

    hub.post(NotificationType::new(7), &Value::Int(1))?;
    hub.unsubscribe(login, &screen);

    bridge.shutdown().await?;
    Ok(())
}
