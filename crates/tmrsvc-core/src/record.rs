//! Timer record layout and the public, generation-checked handle.

use std::fmt;
use std::sync::Arc;

/// Maximum length of a timer's name, matching the reference's fixed char buffer.
pub const MAX_NAME_LEN: usize = 32;

/// Lifecycle state of a pool slot.
///
/// `Unused` is the free-list state; a slot cycles
/// `Unused -> Stopped -> Running -> (Completed | Stopped) -> ... -> Unused`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// On the pool free list; holds no live timer.
    Unused,
    /// Allocated, configured, not counting down.
    Stopped,
    /// Armed and linked into a wheel bucket.
    Running,
    /// A one-shot timer that has fired and not yet been deleted or restarted.
    Completed,
}

/// Whether a timer fires once or re-arms itself after firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOpt {
    /// Fires once after `delay` ticks, then becomes `Completed`.
    OneShot,
    /// Fires every `period` ticks until stopped or deleted.
    Periodic,
}

/// Opaque argument passed to a timer callback.
///
/// Carries the identity of the timer that fired so a shared callback
/// function can distinguish between timers, the way the reference's
/// callbacks distinguish by the `void *arg` they were created with.
#[derive(Debug, Clone)]
pub struct CallbackArg {
    pub handle: TimerHandle,
    pub name: String,
}

/// A timer's callback: invoked by the dispatcher, never while any internal
/// lock is held.
pub type TimerCallback = Arc<dyn Fn(&CallbackArg) + Send + Sync + 'static>;

/// How [`crate::TimerManager::stop`] should treat the timer's callback.
///
/// Mirrors `RTOSTmrStop`'s `opt`/`callback_arg` pair: the reference passes a
/// numeric option plus a `void *callback_arg` that only matters for the
/// `CALLBACK_ARG` case. Here the override argument travels inside the
/// `CallbackArg` variant itself, since this crate already folds the
/// reference's opaque `void *callback_arg` and timer name into one typed
/// `CallbackArg` struct (see its doc comment) rather than keeping a
/// separate untyped pointer field.
#[derive(Debug, Clone)]
pub enum StopOpt {
    /// Stop without invoking the callback.
    None,
    /// Invoke the callback with the timer's own handle and name, the same
    /// argument the dispatcher would have passed had the timer expired
    /// normally.
    Callback,
    /// Invoke the callback with a caller-supplied argument, for this one
    /// call only; the timer's own stored identity is not affected.
    CallbackArg(CallbackArg),
}

/// A stable, generation-checked reference to a pool slot.
///
/// The reference implementation hands callers a raw `RTOS_TMR*` and guards
/// against use-after-free with a `type_marker` sentinel written at alloc
/// time and cleared at free time. A freed-and-reused slot keeps the same
/// address, so a stale pointer can alias a brand new timer. Here the slot's
/// index is paired with a `generation` counter that increments every time
/// the slot is handed out by `alloc`; a handle is only valid for the
/// generation it was issued against, so a stale handle is rejected once the
/// slot has been recycled into a new, unrelated timer. Freeing a slot does
/// not by itself advance its generation, so a repeat `delete` call with the
/// very same handle still resolves to the slot it freed and succeeds as a
/// no-op, matching the reference's idempotent `RTOSTmrDel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}@{}", self.index, self.generation)
    }
}

/// A single preallocated record in the timer pool.
///
/// Doubly-linked via `prev`/`next` slot indices so a slot can live in
/// exactly one wheel bucket's list (or the pool's free list) at a time,
/// without any separate intrusive-list allocation.
pub(crate) struct TimerSlot {
    pub(crate) generation: u32,
    pub(crate) state: TimerState,
    pub(crate) opt: TimerOpt,
    pub(crate) delay: u32,
    pub(crate) period: u32,
    /// Absolute tick at which this timer is next due.
    pub(crate) match_tick: u32,
    pub(crate) name: String,
    pub(crate) callback: Option<TimerCallback>,
    pub(crate) prev: Option<u32>,
    pub(crate) next: Option<u32>,
}

impl TimerSlot {
    pub(crate) fn vacant(generation: u32) -> Self {
        Self {
            generation,
            state: TimerState::Unused,
            opt: TimerOpt::OneShot,
            delay: 0,
            period: 0,
            match_tick: 0,
            name: String::new(),
            callback: None,
            prev: None,
            next: None,
        }
    }

    pub(crate) fn handle(&self, index: u32) -> TimerHandle {
        TimerHandle {
            index,
            generation: self.generation,
        }
    }
}
