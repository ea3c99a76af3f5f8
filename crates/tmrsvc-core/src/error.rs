//! Error types for the timer service.

use thiserror::Error;

/// Errors that can occur during timer API operations.
///
/// This is the idiomatic rendering of the reference RTOS timer manager's
/// numeric error codes plus an out-parameter — every fallible call here
/// returns `Result<_, TimerError>` instead.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// The handle is stale or does not refer to a live timer.
    #[error("invalid or stale timer handle")]
    Invalid,

    /// `Create` was called with an `opt` that is neither one-shot nor
    /// periodic. Kept for parity with the reference's numeric error
    /// surface even though `TimerOpt` being a closed two-variant enum
    /// means the Rust API can never actually construct this error — the
    /// type system rejects an invalid option before `create` ever runs,
    /// where the reference's untyped `INT8U option` needed a runtime check.
    #[error("invalid timer option")]
    InvalidOpt,

    /// A one-shot timer was created or started with `delay == 0`.
    #[error("invalid delay for one-shot timer")]
    InvalidDelay,

    /// A periodic timer was created or started with `period == 0`.
    #[error("invalid period for periodic timer")]
    InvalidPeriod,

    /// The operation is not valid for the timer's current state.
    #[error("invalid timer state for this operation")]
    InvalidState,

    /// The operation requires an armed (running) timer.
    #[error("timer is not active")]
    Inactive,

    /// `Stop` was called on a timer that is already stopped.
    #[error("timer is already stopped")]
    AlreadyStopped,

    /// A callback invocation was requested but the timer has no callback.
    #[error("timer has no callback")]
    NoCallback,

    /// The pool has no free timer records.
    #[error("no timer available in the pool")]
    NonAvail,

    /// Construction-time configuration or allocation failure.
    #[error("timer manager initialization failed: {0}")]
    MallocErr(&'static str),
}

/// Result type used throughout the timer service's public API.
pub type TimerResult<T> = Result<T, TimerError>;
