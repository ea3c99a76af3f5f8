//! [`TimerManager`]: the public, host-process equivalent of the reference
//! RTOS timer manager's `RTOSTmr*` API, minus the interactive pool-size
//! prompt — a manager is constructed directly from a [`Config`], the way
//! `aria-runtime`'s `Runtime` is constructed from a `RuntimeConfig`.

use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tmrsvc_channel::tick_channel;

use crate::config::Config;
use crate::dispatcher::{self, TickClock};
use crate::error::{TimerError, TimerResult};
use crate::pool::PoolState;
use crate::record::{CallbackArg, StopOpt, TimerCallback, TimerHandle, TimerOpt, TimerState};
use crate::wheel::WheelState;

/// A running timer service: a fixed pool of timer records, a timing
/// wheel, and the tick-producer/dispatcher thread pair that drives them.
///
/// Dropping a `TimerManager` signals both background threads to stop and
/// joins them, the way the reference's `RTOSTmrInit` spins its worker
/// thread up for the life of the process — except here teardown is
/// explicit and deterministic instead of living only as long as `main`.
pub struct TimerManager {
    pool: Arc<Mutex<PoolState>>,
    wheel: Arc<Mutex<WheelState>>,
    clock: Arc<TickClock>,
    shutdown: Arc<AtomicBool>,
    producer_handle: Option<JoinHandle<()>>,
    dispatcher_handle: Option<JoinHandle<()>>,
}

impl TimerManager {
    /// Build and start a timer manager: preallocates the pool, builds the
    /// wheel, and spawns the tick producer and dispatcher threads.
    pub fn new(config: Config) -> TimerResult<Self> {
        config.validate()?;

        let pool = Arc::new(Mutex::new(PoolState::new(config.pool_size)));
        let wheel = Arc::new(Mutex::new(WheelState::new(config.wheel_width)));
        let clock = Arc::new(TickClock::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let (notifier, waiter) = tick_channel();
        let producer_handle = dispatcher::spawn_tick_producer(
            config.tick_interval,
            notifier,
            clock.clone(),
            shutdown.clone(),
        );
        let dispatcher_handle =
            dispatcher::spawn_dispatcher(pool.clone(), wheel.clone(), clock.clone(), waiter);

        tracing::info!(
            pool_size = config.pool_size,
            wheel_width = config.wheel_width,
            tick_interval_ms = config.tick_interval.as_millis() as u64,
            "timer manager started"
        );

        Ok(Self {
            pool,
            wheel,
            clock,
            shutdown,
            producer_handle: Some(producer_handle),
            dispatcher_handle: Some(dispatcher_handle),
        })
    }

    /// Build a manager without starting the real-time tick producer or
    /// dispatcher threads, for deterministic tests that drive ticks by
    /// hand via [`TimerManager::advance`] instead of sleeping on wall-clock
    /// time. The pool, wheel, and error/validation behavior are identical
    /// to a manager built with [`TimerManager::new`] — only the tick
    /// source differs.
    #[cfg(feature = "test-util")]
    pub fn new_for_testing(config: Config) -> TimerResult<Self> {
        config.validate()?;
        Ok(Self {
            pool: Arc::new(Mutex::new(PoolState::new(config.pool_size))),
            wheel: Arc::new(Mutex::new(WheelState::new(config.wheel_width))),
            clock: Arc::new(TickClock::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            producer_handle: None,
            dispatcher_handle: None,
        })
    }

    /// Advance the logical tick counter by exactly one tick, processing
    /// whatever is due synchronously on the calling thread.
    ///
    /// Only meaningful on a manager built with
    /// [`TimerManager::new_for_testing`] — a manager built with
    /// [`TimerManager::new`] already has a dispatcher thread advancing the
    /// same tick counter concurrently, so driving it by hand too would
    /// race with that thread.
    #[cfg(feature = "test-util")]
    pub fn advance(&self) {
        dispatcher::process_one_tick(&self.pool, &self.wheel, &self.clock);
    }

    /// Advance by `n` ticks, equivalent to calling [`TimerManager::advance`]
    /// `n` times in order.
    #[cfg(feature = "test-util")]
    pub fn advance_by(&self, n: u32) {
        for _ in 0..n {
            self.advance();
        }
    }

    /// Allocate a timer record from the pool. The timer starts `Stopped`;
    /// call [`TimerManager::start`] to arm it.
    ///
    /// Mirrors `RTOSTmrCreate`, with its option/delay/period validation
    /// performed up front instead of deferred to `Start`.
    pub fn create(
        &self,
        name: &str,
        opt: TimerOpt,
        delay: u32,
        period: u32,
        callback: Option<TimerCallback>,
    ) -> TimerResult<TimerHandle> {
        match opt {
            TimerOpt::OneShot if delay == 0 => return Err(TimerError::InvalidDelay),
            TimerOpt::Periodic if period == 0 => return Err(TimerError::InvalidPeriod),
            _ => {}
        }
        self.pool.lock().alloc(name, opt, delay, period, callback)
    }

    /// Arm a timer, inserting it into the wheel at `current_tick + delay`.
    ///
    /// `delay` governs the *first* expiration for both one-shot and
    /// periodic timers alike, exactly as `RTOSTmrStart` computes
    /// `RTOSTmrMatch = RTOSTmrTickCtr + RTOSTmrDelay` unconditionally;
    /// `period` only comes into play when the dispatcher re-arms a
    /// periodic timer after it fires. A timer may be started with no
    /// callback set at all — `callback` only matters when the timer
    /// actually expires or is stopped with a callback request, not here.
    ///
    /// Rejects an already-`Running` timer with `InvalidState` — a
    /// deliberate strengthening over the reference, which let a second
    /// `Start` silently re-splice a running timer into a new bucket
    /// without removing it from its old one.
    pub fn start(&self, handle: TimerHandle) -> TimerResult<()> {
        let mut pool = self.pool.lock();
        let index = pool.resolve(handle)?;

        match pool.slot(index).state {
            TimerState::Running => return Err(TimerError::InvalidState),
            TimerState::Unused => unreachable!("resolve rejects Unused slots"),
            TimerState::Stopped | TimerState::Completed => {}
        }

        let delay = pool.slot(index).delay;
        let target = self.clock.current_tick().wrapping_add(delay);

        pool.slot_mut(index).state = TimerState::Running;
        let mut wheel = self.wheel.lock();
        wheel.insert(&mut pool, index, target);
        Ok(())
    }

    /// Disarm a timer without freeing its slot, optionally invoking its
    /// callback once on the way down.
    ///
    /// Mirrors `RTOSTmrStop`: fails with `AlreadyStopped` if the timer is
    /// not currently armed; otherwise unlinks it from the wheel (a no-op if
    /// it was `Completed` rather than `Running`) and sets `Stopped`. The
    /// callback, when requested, runs outside both locks exactly like a
    /// dispatcher-driven expiry, and a request for `Callback`/`CallbackArg`
    /// on a timer with no callback set fails with `NoCallback` before any
    /// state change is made.
    pub fn stop(&self, handle: TimerHandle, stop_opt: StopOpt) -> TimerResult<()> {
        let mut pool = self.pool.lock();
        let index = pool.resolve(handle)?;

        match pool.slot(index).state {
            TimerState::Stopped => return Err(TimerError::AlreadyStopped),
            TimerState::Unused => unreachable!("resolve rejects Unused slots"),
            TimerState::Running | TimerState::Completed => {}
        }

        if !matches!(stop_opt, StopOpt::None) && pool.slot(index).callback.is_none() {
            return Err(TimerError::NoCallback);
        }

        let invoke_arg = match &stop_opt {
            StopOpt::None => None,
            StopOpt::Callback => Some(CallbackArg {
                handle: pool.slot(index).handle(index),
                name: pool.slot(index).name.clone(),
            }),
            StopOpt::CallbackArg(arg) => Some(arg.clone()),
        };
        let callback = pool.slot(index).callback.clone();

        if pool.slot(index).state == TimerState::Running {
            let mut wheel = self.wheel.lock();
            wheel.remove(&mut pool, index);
        }
        pool.slot_mut(index).state = TimerState::Stopped;
        drop(pool);

        if let (Some(arg), Some(callback)) = (invoke_arg, callback) {
            if let Err(payload) =
                panic::catch_unwind(panic::AssertUnwindSafe(|| callback(&arg)))
            {
                tracing::error!(
                    timer = %arg.handle,
                    name = %arg.name,
                    "stop-triggered timer callback panicked: {}",
                    crate::dispatcher::panic_message(&payload)
                );
            }
        }

        Ok(())
    }

    /// Free a timer's slot back to the pool, removing it from the wheel
    /// first if it is still armed. Mirrors `RTOSTmrDel`, including its
    /// treatment of deleting an already-`Unused` record as a successful
    /// no-op: calling `delete` twice with the same handle is idempotent,
    /// it does not turn into an `Invalid`-handle error the second time.
    pub fn delete(&self, handle: TimerHandle) -> TimerResult<()> {
        let mut pool = self.pool.lock();
        let index = pool.resolve_any(handle)?;
        if pool.slot(index).state == TimerState::Running {
            let mut wheel = self.wheel.lock();
            wheel.remove(&mut pool, index);
        }
        pool.free(handle)
    }

    /// Fetch a timer's name. Mirrors `RTOSTmrNameGet`.
    pub fn name_get(&self, handle: TimerHandle) -> TimerResult<String> {
        let pool = self.pool.lock();
        let index = pool.resolve(handle)?;
        Ok(pool.slot(index).name.clone())
    }

    /// Fetch a timer's current state. Mirrors `RTOSTmrStateGet`.
    pub fn state_get(&self, handle: TimerHandle) -> TimerResult<TimerState> {
        let pool = self.pool.lock();
        let index = pool.resolve(handle)?;
        Ok(pool.slot(index).state)
    }

    /// Fetch the number of ticks remaining before a running timer next
    /// fires. Mirrors `RTOSTmrRemainGet`, returning `Inactive` for any
    /// timer not currently armed.
    pub fn remain_get(&self, handle: TimerHandle) -> TimerResult<u32> {
        let pool = self.pool.lock();
        let index = pool.resolve(handle)?;
        if pool.slot(index).state != TimerState::Running {
            return Err(TimerError::Inactive);
        }
        let current = self.clock.current_tick();
        Ok(pool.slot(index).match_tick.wrapping_sub(current))
    }

    /// Number of free slots remaining in the pool.
    pub fn free_count(&self) -> u32 {
        self.pool.lock().free_count()
    }

    /// Capacity of the pool, fixed at construction time.
    pub fn capacity(&self) -> u32 {
        self.pool.lock().capacity()
    }

    /// The dispatcher's current absolute tick counter.
    pub fn current_tick(&self) -> u32 {
        self.clock.current_tick()
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.producer_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.dispatcher_handle.take() {
            let _ = handle.join();
        }
    }
}
