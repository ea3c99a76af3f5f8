//! `tmrsvc-core`: a fixed-pool, timing-wheel scheduling engine.
//!
//! This is a host-process, general-purpose-OS rendering of a small-RTOS
//! timer service: a preallocated pool of timer records, a fixed-width
//! timing wheel bucketing them by absolute tick, and a dispatcher thread
//! that fires due callbacks outside of any internal lock.
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use tmrsvc_core::{Config, TimerManager, TimerOpt};
//!
//! let config = Config::builder()
//!     .pool_size(4)
//!     .wheel_width(8)
//!     .tick_interval(Duration::from_millis(10))
//!     .build()
//!     .unwrap();
//! let manager = TimerManager::new(config).unwrap();
//!
//! let fired = Arc::new(AtomicUsize::new(0));
//! let fired_clone = fired.clone();
//! let handle = manager
//!     .create("greeting", TimerOpt::OneShot, 2, 0, Some(Arc::new(move |_arg: &_| {
//!         fired_clone.fetch_add(1, Ordering::SeqCst);
//!     })))
//!     .unwrap();
//! manager.start(handle).unwrap();
//! ```

mod config;
mod dispatcher;
mod error;
mod manager;
mod pool;
mod record;
mod wheel;

pub use config::{Config, ConfigBuilder, DEFAULT_TICK_INTERVAL, DEFAULT_WHEEL_WIDTH};
pub use error::{TimerError, TimerResult};
pub use manager::TimerManager;
pub use record::{
    CallbackArg, StopOpt, TimerCallback, TimerHandle, TimerOpt, TimerState, MAX_NAME_LEN,
};
