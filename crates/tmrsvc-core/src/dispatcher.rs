//! Tick production and dispatch.
//!
//! Two threads, grounded on the timer service's tick-loss-proof design
//! (spec option (b): monotonic clock plus catch-up loop, rather than the
//! reference's one-semaphore-post-per-`SIGALRM` scheme, which silently
//! drops ticks under load):
//!
//! - the **tick producer** sleeps toward successive absolute deadlines
//!   computed from a single `Instant` anchor and notifies the dispatcher
//!   on each one, tracking how many ticks it has emitted in a plain
//!   counter;
//! - the **dispatcher** wakes on any notification, then drains the gap
//!   between emitted and processed ticks one tick at a time, so periodic
//!   timers are still re-armed with the correct phase even if several
//!   ticks coalesced into a single wakeup.
//!
//! Per-tick bucket scanning and callback dispatch mirror `RTOSTmrTask`:
//! collect the records due this tick, release every lock, invoke callbacks
//! through `catch_unwind`, then re-lock to retire (one-shot) or re-arm
//! (periodic) each one.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tmrsvc_channel::{Notifier, TickChannelError, Waiter};

use crate::pool::PoolState;
use crate::record::{CallbackArg, TimerOpt, TimerState};
use crate::wheel::WheelState;

/// Shared tick bookkeeping between the producer and the dispatcher.
pub(crate) struct TickClock {
    /// Ticks the producer has released so far.
    emitted: AtomicU64,
    /// Ticks the dispatcher has fully processed so far; also the wheel's
    /// current absolute tick counter (`RTOSTmrTickCtr`).
    pub(crate) processed: AtomicU32,
}

impl TickClock {
    pub(crate) fn new() -> Self {
        Self {
            emitted: AtomicU64::new(0),
            processed: AtomicU32::new(0),
        }
    }

    pub(crate) fn current_tick(&self) -> u32 {
        self.processed.load(Ordering::Acquire)
    }
}

/// Spawn the tick producer thread. Stops and notifies shutdown once
/// `shutdown` is observed set.
pub(crate) fn spawn_tick_producer(
    interval: Duration,
    notifier: Notifier,
    clock: Arc<TickClock>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let start = Instant::now();
        let mut next_tick: u64 = 1;
        loop {
            if shutdown.load(Ordering::Acquire) {
                notifier.shutdown();
                return;
            }
            let target = start + interval.saturating_mul(next_tick.min(u32::MAX as u64) as u32);
            let now = Instant::now();
            if now < target {
                thread::sleep(target - now);
                continue;
            }
            clock.emitted.fetch_add(1, Ordering::AcqRel);
            next_tick += 1;
            notifier.notify();
        }
    })
}

/// Spawn the dispatcher thread.
pub(crate) fn spawn_dispatcher(
    pool: Arc<Mutex<PoolState>>,
    wheel: Arc<Mutex<WheelState>>,
    clock: Arc<TickClock>,
    waiter: Waiter,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match waiter.wait() {
            Err(TickChannelError::ShutDown) => return,
            Ok(()) => {}
        }
        loop {
            let emitted = clock.emitted.load(Ordering::Acquire);
            let processed = clock.processed.load(Ordering::Acquire) as u64;
            if processed >= emitted {
                break;
            }
            let backlog = emitted - processed;
            if backlog > 1 {
                tracing::warn!(backlog, "dispatcher is behind the tick producer, catching up");
            }
            process_one_tick(&pool, &wheel, &clock);
        }
    })
}

/// Process exactly one tick: drain due records, invoke callbacks outside
/// any lock, then retire or re-arm each one.
///
/// Called both from the dispatcher's own catch-up loop and, under
/// `test-util`, directly by [`crate::TimerManager::advance`] for
/// deterministic tests.
pub(crate) fn process_one_tick(pool: &Mutex<PoolState>, wheel: &Mutex<WheelState>, clock: &TickClock) {
    let current = clock.current_tick();

    let due = {
        let mut pool_guard = pool.lock();
        let mut wheel_guard = wheel.lock();
        let due = wheel_guard.drain_due(&mut pool_guard, current);
        for &index in &due {
            pool_guard.slot_mut(index).state = TimerState::Completed;
        }
        due
    };

    for index in due {
        let (callback_arg, opt, period, callback) = {
            let pool_guard = pool.lock();
            let slot = pool_guard.slot(index);
            (
                CallbackArg {
                    handle: slot.handle(index),
                    name: slot.name.clone(),
                },
                slot.opt,
                slot.period,
                slot.callback.clone(),
            )
        };

        if let Some(callback) = callback {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(&callback_arg)))
            {
                tracing::error!(
                    timer = %callback_arg.handle,
                    name = %callback_arg.name,
                    "timer callback panicked: {}",
                    panic_message(&payload)
                );
            }
        } else {
            tracing::warn!(timer = %callback_arg.handle, "due timer fired with no callback");
        }

        match opt {
            TimerOpt::Periodic => {
                let mut pool_guard = pool.lock();
                let mut wheel_guard = wheel.lock();
                let next_match = current.wrapping_add(period);
                pool_guard.slot_mut(index).state = TimerState::Running;
                wheel_guard.insert(&mut pool_guard, index, next_match);
            }
            TimerOpt::OneShot => {
                let mut pool_guard = pool.lock();
                // Mirrors the reference's RTOSTmrTask calling free_timer_obj
                // immediately after firing a one-shot: Completed is a
                // momentary state, never externally observable, because the
                // slot is freed before either lock is released to a client.
                // The handle's generation is untouched by this free (it only
                // advances on the slot's next alloc), so a captured handle
                // is rejected as Invalid via state -- not generation --
                // mismatch, and a repeat delete() on it is a harmless no-op.
                let _ = pool_guard.free(callback_arg.handle);
            }
        }
    }

    clock.processed.fetch_add(1, Ordering::AcqRel);
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TimerOpt as Opt;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn process_one_tick_fires_due_one_shot_and_returns_it_to_the_pool() {
        let mut pool_state = PoolState::new(2);
        let mut wheel_state = WheelState::new(4);

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let handle = pool_state
            .alloc(
                "once",
                Opt::OneShot,
                3,
                0,
                Some(Arc::new(move |_arg: &CallbackArg| {
                    fired_clone.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();
        let index = pool_state.resolve(handle).unwrap();
        pool_state.slot_mut(index).state = TimerState::Running;
        wheel_state.insert(&mut pool_state, index, 3);

        let pool = Arc::new(Mutex::new(pool_state));
        let wheel = Arc::new(Mutex::new(wheel_state));
        let clock = Arc::new(TickClock::new());
        clock.processed.store(3, Ordering::SeqCst);

        process_one_tick(&pool, &wheel, &clock);

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(clock.processed.load(Ordering::SeqCst), 4);
        let pool_guard = pool.lock();
        // `resolve` (unlike `resolve_any`) rejects an Unused slot outright,
        // so the handle is Invalid as soon as the slot is freed, regardless
        // of whether its generation moved -- it hasn't, yet, since free()
        // doesn't bump it.
        assert_eq!(pool_guard.resolve(handle).unwrap_err(), crate::error::TimerError::Invalid);
        assert_eq!(pool_guard.free_count(), 2);
    }

    #[test]
    fn process_one_tick_rearms_periodic_timer() {
        let mut pool_state = PoolState::new(1);
        let mut wheel_state = WheelState::new(4);

        let handle = pool_state
            .alloc("periodic", Opt::Periodic, 0, 5, Some(Arc::new(|_: &CallbackArg| {})))
            .unwrap();
        let index = pool_state.resolve(handle).unwrap();
        pool_state.slot_mut(index).state = TimerState::Running;
        wheel_state.insert(&mut pool_state, index, 2);

        let pool = Arc::new(Mutex::new(pool_state));
        let wheel = Arc::new(Mutex::new(wheel_state));
        let clock = Arc::new(TickClock::new());
        clock.processed.store(2, Ordering::SeqCst);

        process_one_tick(&pool, &wheel, &clock);

        let pool_guard = pool.lock();
        assert_eq!(pool_guard.slot(index).state, TimerState::Running);
        assert_eq!(pool_guard.slot(index).match_tick, 7);
    }

    #[test]
    fn panicking_callback_is_isolated_and_timer_is_still_retired() {
        let mut pool_state = PoolState::new(1);
        let mut wheel_state = WheelState::new(4);

        let handle = pool_state
            .alloc(
                "panics",
                Opt::OneShot,
                1,
                0,
                Some(Arc::new(|_: &CallbackArg| panic!("boom"))),
            )
            .unwrap();
        let index = pool_state.resolve(handle).unwrap();
        pool_state.slot_mut(index).state = TimerState::Running;
        wheel_state.insert(&mut pool_state, index, 1);

        let pool = Arc::new(Mutex::new(pool_state));
        let wheel = Arc::new(Mutex::new(wheel_state));
        let clock = Arc::new(TickClock::new());
        clock.processed.store(1, Ordering::SeqCst);

        process_one_tick(&pool, &wheel, &clock);

        // The panic is isolated: retirement still runs and the slot is
        // returned to the pool exactly as if the callback had returned
        // normally.
        let pool_guard = pool.lock();
        assert_eq!(pool_guard.slot(index).state, TimerState::Unused);
        assert_eq!(pool_guard.free_count(), 1);
    }
}
