//! # TimerBridge: token table shared by bind, fire and release.
//!
//! ## Rules
//! - One [`Mutex`] guards every token entry; it is never held across
//!   `NativeCore::timer_call`.
//! - A fire invokes the callback only if the binding is present both when the
//!   fire is observed and when the posted job runs.
//! - `release` clears the binding before cancelling the schedule.
//! - A fire whose job already passed its final check may still complete after
//!   `release` returns.
//! - Starting a running timer replaces its schedule; `stop` keeps the binding.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::source::{FireFn, TimerSource};
use super::{Schedule, TimerMode, TimerToken};
use crate::error::BridgeError;
use crate::executor::{ContextId, ExecutionContexts};
use crate::native::{CallbackRef, NativeCore};

/// Callback plus the context it must run on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Binding {
    callback: CallbackRef,
    context: ContextId,
}

#[derive(Default)]
struct TimerEntry {
    binding: Option<Binding>,
    schedule: Option<Schedule>,
}

/// Creates, schedules and invalidates timers that call back into the native core.
pub struct TimerBridge {
    table: Mutex<HashMap<TimerToken, TimerEntry>>,
    next_token: AtomicU64,
    source: Arc<dyn TimerSource>,
    native: Arc<dyn NativeCore>,
    contexts: Arc<ExecutionContexts>,
    min_period: Duration,
    me: Weak<TimerBridge>,
}

impl TimerBridge {
    /// Creates the bridge.
    ///
    /// Repeating periods below `min_period` are raised to it.
    pub fn new(
        native: Arc<dyn NativeCore>,
        contexts: Arc<ExecutionContexts>,
        source: Arc<dyn TimerSource>,
        min_period: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            table: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            source,
            native,
            contexts,
            min_period,
            me: me.clone(),
        })
    }

    /// Allocates a new, unbound, stopped timer.
    pub fn create_timer(&self) -> TimerToken {
        let token = TimerToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.table.lock().insert(token, TimerEntry::default());
        trace!(timer = %token, "timer created");
        token
    }

    /// Attaches `callback`, to be invoked on `context`.
    ///
    /// Rebinding replaces the previous callback.
    pub fn bind(
        &self,
        token: TimerToken,
        callback: CallbackRef,
        context: ContextId,
    ) -> Result<(), BridgeError> {
        self.contexts.get(context)?;
        let mut table = self.table.lock();
        let entry = table
            .get_mut(&token)
            .ok_or(BridgeError::UnknownTimer(token))?;
        entry.binding = Some(Binding { callback, context });
        debug!(timer = %token, %callback, %context, "timer bound");
        Ok(())
    }

    /// Starts (or restarts) the timer.
    ///
    /// `OneShot` fires once after `period`; `Repeating` fires immediately and then
    /// every `period`.
    pub fn start(
        &self,
        token: TimerToken,
        mode: TimerMode,
        period: Duration,
    ) -> Result<(), BridgeError> {
        let schedule = match mode {
            TimerMode::OneShot => Schedule::Once { delay: period },
            TimerMode::Repeating if period.is_zero() => {
                return Err(BridgeError::InvalidPeriod { period_ms: 0 });
            }
            TimerMode::Repeating => Schedule::Repeating {
                initial: Duration::ZERO,
                period: period.max(self.min_period),
            },
        };

        let mut table = self.table.lock();
        let entry = table
            .get_mut(&token)
            .ok_or(BridgeError::UnknownTimer(token))?;
        entry.schedule = Some(schedule);

        // Scheduled under the lock so a concurrent release cannot orphan the task.
        let fire = self.fire_fn(token);
        match schedule {
            Schedule::Once { delay } => self.source.schedule_once(token, delay, fire),
            Schedule::Repeating { initial, period } => {
                self.source.schedule_repeating(token, initial, period, fire)
            }
        }
        debug!(timer = %token, ?schedule, "timer started");
        Ok(())
    }

    /// Cancels future fires; the binding is kept.
    pub fn stop(&self, token: TimerToken) -> Result<(), BridgeError> {
        let mut table = self.table.lock();
        let entry = table
            .get_mut(&token)
            .ok_or(BridgeError::UnknownTimer(token))?;
        if entry.schedule.take().is_some() {
            self.source.cancel(token);
            debug!(timer = %token, "timer stopped");
        }
        Ok(())
    }

    /// Alias of [`stop`](Self::stop).
    #[inline]
    pub fn reset(&self, token: TimerToken) -> Result<(), BridgeError> {
        self.stop(token)
    }

    /// Invalidates the callback, cancels the schedule and forgets the token.
    pub fn release(&self, token: TimerToken) -> Result<(), BridgeError> {
        let mut table = self.table.lock();
        let mut entry = table
            .remove(&token)
            .ok_or(BridgeError::UnknownTimer(token))?;
        entry.binding = None;
        if entry.schedule.is_some() {
            self.source.cancel(token);
        }
        drop(table);
        debug!(timer = %token, "timer released");
        Ok(())
    }

    /// Releases every timer; returns how many there were.
    pub fn release_all(&self) -> usize {
        let drained: Vec<TimerToken> = {
            let mut table = self.table.lock();
            let tokens = table.keys().copied().collect();
            table.clear();
            self.source.cancel_all();
            tokens
        };
        if !drained.is_empty() {
            debug!(count = drained.len(), "all timers released");
        }
        drained.len()
    }

    /// Handles one tick for `token`.
    ///
    /// Unknown or unbound tokens are dropped silently.
    pub fn deliver_timer_fire(&self, token: TimerToken) {
        let binding = {
            let mut table = self.table.lock();
            let Some(entry) = table.get_mut(&token) else {
                trace!(timer = %token, "fire for released timer dropped");
                return;
            };
            if matches!(entry.schedule, Some(Schedule::Once { .. })) {
                entry.schedule = None;
            }
            match entry.binding {
                Some(b) => b,
                None => {
                    trace!(timer = %token, "fire for unbound timer dropped");
                    return;
                }
            }
        };

        let context = match self.contexts.get(binding.context) {
            Ok(ctx) => ctx,
            Err(err) => {
                warn!(timer = %token, error = %err, "timer context unavailable; fire dropped");
                return;
            }
        };

        let me = self.me.clone();
        let native = Arc::clone(&self.native);
        let job = move || {
            let still_bound = me
                .upgrade()
                .is_some_and(|bridge| bridge.binding_of(token) == Some(binding));
            if !still_bound {
                trace!(timer = %token, "timer released before invocation");
                return;
            }
            native.timer_call(binding.callback, binding.context);
        };
        if let Err(err) = context.post(job) {
            warn!(timer = %token, error = %err, "timer invocation rejected");
        }
    }

    /// True when the timer has a live schedule.
    pub fn is_running(&self, token: TimerToken) -> bool {
        self.table
            .lock()
            .get(&token)
            .is_some_and(|e| e.schedule.is_some())
    }

    /// True when the timer has a callback attached.
    pub fn is_bound(&self, token: TimerToken) -> bool {
        self.binding_of(token).is_some()
    }

    /// Number of timers not yet released.
    pub fn timer_count(&self) -> usize {
        self.table.lock().len()
    }

    fn binding_of(&self, token: TimerToken) -> Option<Binding> {
        self.table.lock().get(&token).and_then(|e| e.binding)
    }

    fn fire_fn(&self, token: TimerToken) -> FireFn {
        let me = self.me.clone();
        Arc::new(move || {
            if let Some(bridge) = me.upgrade() {
                bridge.deliver_timer_fire(token);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{self, Instant};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::native::mock::{MockNative, NativeCall};
    use crate::timer::TokioTimerSource;

    struct Fixture {
        native: Arc<MockNative>,
        contexts: Arc<ExecutionContexts>,
        timers: Arc<TimerBridge>,
    }

    fn fixture() -> Fixture {
        let native = MockNative::new();
        let contexts = ExecutionContexts::new("main", CancellationToken::new());
        let core: Arc<dyn NativeCore> = native.clone();
        let timers = TimerBridge::new(
            core,
            Arc::clone(&contexts),
            Arc::new(TokioTimerSource::new()),
            Duration::from_millis(1),
        );
        Fixture {
            native,
            contexts,
            timers,
        }
    }

    fn calls(native: &MockNative) -> usize {
        native.count(|c| matches!(c, NativeCall::TimerCall { .. }))
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_fires_once_on_bound_context() {
        let fx = fixture();
        let t = fx.timers.create_timer();
        fx.timers
            .bind(t, CallbackRef(0xa), ContextId::MAIN)
            .unwrap();

        let started = Instant::now();
        fx.timers
            .start(t, TimerMode::OneShot, Duration::from_millis(100))
            .unwrap();
        time::sleep(Duration::from_millis(400)).await;

        let fires = fx.native.fires();
        assert_eq!(fires.len(), 1);
        let elapsed = fires[0].1 - started;
        assert!(elapsed >= Duration::from_millis(100) && elapsed < Duration::from_millis(110));
        assert_eq!(
            fx.native.calls().last(),
            Some(&NativeCall::TimerCall {
                callback: CallbackRef(0xa),
                context: ContextId::MAIN,
                ran_on: Some(ContextId::MAIN),
            })
        );
        assert!(!fx.timers.is_running(t));
        assert!(fx.timers.is_bound(t));
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_fires_immediately_then_every_period() {
        let fx = fixture();
        let t = fx.timers.create_timer();
        fx.timers.bind(t, CallbackRef(1), ContextId::MAIN).unwrap();

        let started = Instant::now();
        fx.timers
            .start(t, TimerMode::Repeating, Duration::from_millis(50))
            .unwrap();
        time::sleep(Duration::from_millis(120)).await;

        let offsets: Vec<u128> = fx
            .native
            .fires()
            .iter()
            .map(|(_, at)| (*at - started).as_millis())
            .collect();
        assert_eq!(offsets, vec![0, 50, 100]);

        fx.timers.stop(t).unwrap();
        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(calls(&fx.native), 3);
        assert!(fx.timers.is_bound(t));
    }

    #[tokio::test(start_paused = true)]
    async fn release_prevents_pending_fire() {
        let fx = fixture();
        let t = fx.timers.create_timer();
        fx.timers.bind(t, CallbackRef(2), ContextId::MAIN).unwrap();
        fx.timers
            .start(t, TimerMode::OneShot, Duration::from_millis(100))
            .unwrap();

        time::sleep(Duration::from_millis(50)).await;
        fx.timers.release(t).unwrap();
        time::sleep(Duration::from_millis(200)).await;

        assert_eq!(calls(&fx.native), 0);
        assert_eq!(fx.timers.timer_count(), 0);
        assert!(matches!(
            fx.timers.release(t),
            Err(BridgeError::UnknownTimer(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn fired_and_released_timers_leave_source_empty() {
        let native = MockNative::new();
        let contexts = ExecutionContexts::new("main", CancellationToken::new());
        let source = Arc::new(TokioTimerSource::new());
        let core: Arc<dyn NativeCore> = native.clone();
        let timers = TimerBridge::new(
            core,
            contexts,
            source.clone(),
            Duration::from_millis(1),
        );

        let tokens: Vec<TimerToken> = (0..20).map(|_| timers.create_timer()).collect();
        for (i, t) in tokens.iter().enumerate() {
            timers.bind(*t, CallbackRef(i as u64), ContextId::MAIN).unwrap();
            timers
                .start(*t, TimerMode::OneShot, Duration::from_millis(5))
                .unwrap();
        }
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls(&native), 20);
        assert_eq!(source.scheduled(), 0);

        for t in tokens {
            timers.release(t).unwrap();
        }
        assert_eq!(source.scheduled(), 0);
        assert_eq!(timers.timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn release_between_fire_and_job_skips_callback() {
        let fx = fixture();
        let t = fx.timers.create_timer();
        fx.timers.bind(t, CallbackRef(3), ContextId::MAIN).unwrap();

        fx.timers.deliver_timer_fire(t);
        fx.timers.release(t).unwrap();
        fx.timers.deliver_timer_fire(t);
        time::sleep(Duration::from_millis(10)).await;

        assert_eq!(calls(&fx.native), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unbound_fire_is_dropped() {
        let fx = fixture();
        let t = fx.timers.create_timer();

        fx.timers.deliver_timer_fire(t);
        fx.timers.deliver_timer_fire(TimerToken::from_raw(999));
        time::sleep(Duration::from_millis(10)).await;

        assert_eq!(calls(&fx.native), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn callback_runs_on_the_bound_context() {
        let fx = fixture();
        let worker = fx.contexts.spawn("worker");
        let t = fx.timers.create_timer();
        fx.timers.bind(t, CallbackRef(4), worker.id()).unwrap();

        fx.timers.deliver_timer_fire(t);
        time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            fx.native.calls(),
            vec![NativeCall::TimerCall {
                callback: CallbackRef(4),
                context: worker.id(),
                ran_on: Some(worker.id()),
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_arguments_are_rejected() {
        let fx = fixture();
        let t = fx.timers.create_timer();

        assert!(matches!(
            fx.timers.start(t, TimerMode::Repeating, Duration::ZERO),
            Err(BridgeError::InvalidPeriod { period_ms: 0 })
        ));
        assert!(matches!(
            fx.timers.bind(t, CallbackRef(5), ContextId(42)),
            Err(BridgeError::UnknownContext(_))
        ));
        let ghost = TimerToken::from_raw(77);
        assert!(matches!(
            fx.timers.start(ghost, TimerMode::OneShot, Duration::from_millis(1)),
            Err(BridgeError::UnknownTimer(_))
        ));
        assert!(matches!(fx.timers.reset(ghost), Err(BridgeError::UnknownTimer(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_schedule() {
        let fx = fixture();
        let t = fx.timers.create_timer();
        fx.timers.bind(t, CallbackRef(6), ContextId::MAIN).unwrap();

        fx.timers
            .start(t, TimerMode::OneShot, Duration::from_millis(50))
            .unwrap();
        fx.timers
            .start(t, TimerMode::OneShot, Duration::from_millis(200))
            .unwrap();
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls(&fx.native), 0);
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(calls(&fx.native), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn release_all_forgets_every_timer() {
        let fx = fixture();
        let a = fx.timers.create_timer();
        let b = fx.timers.create_timer();
        fx.timers.bind(a, CallbackRef(7), ContextId::MAIN).unwrap();
        fx.timers
            .start(a, TimerMode::Repeating, Duration::from_millis(10))
            .unwrap();
        fx.timers
            .start(b, TimerMode::OneShot, Duration::from_millis(10))
            .unwrap();

        assert_eq!(fx.timers.release_all(), 2);
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls(&fx.native), 0);
        assert_eq!(fx.timers.timer_count(), 0);
    }
}
