//! # Timer sources.
//!
//! [`TimerSource`] is the seam to whatever actually produces ticks. The bridge
//! calls it while holding its token table lock, so implementations must return
//! promptly and never fire synchronously from inside `schedule_*`.
//!
//! [`TokioTimerSource`] runs one tokio task per scheduled timer:
//! - `Once` → `sleep(delay)` then fire;
//! - `Repeating` → `interval_at(now + initial, period)` with
//!   [`MissedTickBehavior::Delay`], so a stalled runtime never produces a burst.
//!
//! Scheduling a token that is already scheduled cancels the previous task.
//! A finished one-shot removes its own entry unless a newer schedule replaced it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{Schedule, TimerToken};

/// Callback invoked on every tick.
pub type FireFn = Arc<dyn Fn() + Send + Sync + 'static>;

/// Producer of timer ticks.
pub trait TimerSource: Send + Sync + 'static {
    /// Fires `fire` once after `delay`, replacing any schedule for `token`.
    fn schedule_once(&self, token: TimerToken, delay: Duration, fire: FireFn);

    /// Fires `fire` after `initial` and then every `period`, replacing any schedule for `token`.
    fn schedule_repeating(
        &self,
        token: TimerToken,
        initial: Duration,
        period: Duration,
        fire: FireFn,
    );

    /// Cancels future fires for `token`. Unknown tokens are ignored.
    fn cancel(&self, token: TimerToken);

    /// Cancels everything.
    fn cancel_all(&self);
}

/// One spawned schedule; `generation` tells a restart apart from its predecessor.
struct Scheduled {
    generation: u64,
    cancel: CancellationToken,
}

type Tasks = Arc<Mutex<HashMap<TimerToken, Scheduled>>>;

/// [`TimerSource`] backed by tokio timers.
pub struct TokioTimerSource {
    runtime: Handle,
    tasks: Tasks,
    generation: AtomicU64,
    root: CancellationToken,
}

impl TokioTimerSource {
    /// Creates a source on the current tokio runtime.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    /// Creates a source spawning onto `runtime`.
    pub fn with_handle(runtime: Handle) -> Self {
        Self {
            runtime,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
            root: CancellationToken::new(),
        }
    }

    /// Number of timers with a live schedule.
    pub fn scheduled(&self) -> usize {
        self.tasks.lock().len()
    }

    fn spawn(&self, token: TimerToken, schedule: Schedule, fire: FireFn) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let cancel = self.root.child_token();
        let task_cancel = cancel.clone();
        let tasks = Arc::clone(&self.tasks);

        if let Some(previous) = self
            .tasks
            .lock()
            .insert(token, Scheduled { generation, cancel })
        {
            previous.cancel.cancel();
        }

        self.runtime.spawn(async move {
            match schedule {
                Schedule::Once { delay } => {
                    tokio::select! {
                        biased;
                        _ = task_cancel.cancelled() => {}
                        _ = time::sleep(delay) => {
                            trace!(timer = %token, "one-shot tick");
                            fire();
                        }
                    }
                    let mut tasks = tasks.lock();
                    if tasks.get(&token).is_some_and(|s| s.generation == generation) {
                        tasks.remove(&token);
                    }
                }
                Schedule::Repeating { initial, period } => {
                    let period = period.max(Duration::from_millis(1));
                    let mut ticks = time::interval_at(Instant::now() + initial, period);
                    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        tokio::select! {
                            biased;
                            _ = task_cancel.cancelled() => break,
                            _ = ticks.tick() => {
                                trace!(timer = %token, "repeating tick");
                                fire();
                            }
                        }
                    }
                }
            }
        });
    }
}

impl Default for TokioTimerSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerSource for TokioTimerSource {
    fn schedule_once(&self, token: TimerToken, delay: Duration, fire: FireFn) {
        self.spawn(token, Schedule::Once { delay }, fire);
    }

    fn schedule_repeating(
        &self,
        token: TimerToken,
        initial: Duration,
        period: Duration,
        fire: FireFn,
    ) {
        self.spawn(token, Schedule::Repeating { initial, period }, fire);
    }

    fn cancel(&self, token: TimerToken) {
        if let Some(scheduled) = self.tasks.lock().remove(&token) {
            scheduled.cancel.cancel();
        }
    }

    fn cancel_all(&self) {
        let drained: Vec<Scheduled> = self.tasks.lock().drain().map(|(_, s)| s).collect();
        for scheduled in drained {
            scheduled.cancel.cancel();
        }
    }
}

impl Drop for TokioTimerSource {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, FireFn) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        (hits, Arc::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn once_fires_a_single_time() {
        let source = TokioTimerSource::new();
        let (hits, fire) = counter();

        source.schedule_once(TimerToken::from_raw(1), Duration::from_millis(100), fire);
        time::sleep(Duration::from_millis(99)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(source.scheduled(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fired_one_shots_leave_no_entries() {
        let source = TokioTimerSource::new();
        let (hits, fire) = counter();

        for raw in 0..100 {
            source.schedule_once(TimerToken::from_raw(raw), Duration::from_millis(1), Arc::clone(&fire));
        }
        time::sleep(Duration::from_millis(50)).await;

        assert_eq!(hits.load(Ordering::SeqCst), 100);
        assert!(source.tasks.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_one_shot_keeps_the_newer_entry() {
        let source = TokioTimerSource::new();
        let (hits, fire) = counter();
        let token = TimerToken::from_raw(4);

        source.schedule_once(token, Duration::from_millis(10), Arc::clone(&fire));
        source.schedule_once(token, Duration::from_millis(100), fire);
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.tasks.lock().len(), 1);
        assert_eq!(source.scheduled(), 1);

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(source.tasks.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_previous() {
        let source = TokioTimerSource::new();
        let (hits, fire) = counter();
        let token = TimerToken::from_raw(2);

        source.schedule_once(token, Duration::from_millis(50), Arc::clone(&fire));
        source.schedule_once(token, Duration::from_millis(200), fire);
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_stops_repeating() {
        let source = TokioTimerSource::new();
        let (hits, fire) = counter();

        source.schedule_repeating(
            TimerToken::from_raw(3),
            Duration::ZERO,
            Duration::from_millis(10),
            fire,
        );
        time::sleep(Duration::from_millis(25)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        source.cancel_all();
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
