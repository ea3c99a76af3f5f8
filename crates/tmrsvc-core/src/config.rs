//! Configuration for a [`crate::TimerManager`].
//!
//! Mirrors the reference RTOS timer manager's three tunables — pool size,
//! wheel width, and tick rate — as a typed, validated builder instead of an
//! interactive `scanf` prompt. When the `config-toml` feature is enabled, a
//! `Config` can also be loaded from a TOML file, the same way the rest of
//! the toolchain loads package manifests.

use std::time::Duration;

use crate::error::TimerError;

/// Default number of buckets in the timing wheel, matching the reference's
/// hash table size.
pub const DEFAULT_WHEEL_WIDTH: u32 = 10;

/// Default tick interval, matching the reference's `RTOS_CFG_TMR_TASK_RATE`.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Validated configuration for a [`crate::TimerManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of preallocated timer records. Never grows after init.
    pub pool_size: u32,
    /// Number of buckets in the timing wheel.
    pub wheel_width: u32,
    /// Wall-clock interval between logical ticks.
    pub tick_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_size: 16,
            wheel_width: DEFAULT_WHEEL_WIDTH,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl Config {
    /// Start building a configuration from defaults.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validate the configuration, returning `TimerError::MallocErr` with a
    /// reason on the first violated constraint.
    pub fn validate(&self) -> Result<(), TimerError> {
        if self.pool_size == 0 {
            return Err(TimerError::MallocErr("pool_size must be greater than zero"));
        }
        if self.wheel_width == 0 {
            return Err(TimerError::MallocErr(
                "wheel_width must be greater than zero",
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(TimerError::MallocErr(
                "tick_interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: ConfigOverrides,
}

#[derive(Debug, Clone, Default)]
struct ConfigOverrides {
    pool_size: Option<u32>,
    wheel_width: Option<u32>,
    tick_interval: Option<Duration>,
}

impl ConfigBuilder {
    /// Set the pool size (`N` in the reference).
    pub fn pool_size(mut self, n: u32) -> Self {
        self.config.pool_size = Some(n);
        self
    }

    /// Set the wheel width (`W` in the reference).
    pub fn wheel_width(mut self, w: u32) -> Self {
        self.config.wheel_width = Some(w);
        self
    }

    /// Set the tick interval.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = Some(interval);
        self
    }

    /// Finish building, validating the result.
    pub fn build(self) -> Result<Config, TimerError> {
        let defaults = Config::default();
        let config = Config {
            pool_size: self.config.pool_size.unwrap_or(defaults.pool_size),
            wheel_width: self.config.wheel_width.unwrap_or(defaults.wheel_width),
            tick_interval: self
                .config
                .tick_interval
                .unwrap_or(defaults.tick_interval),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "config-toml")]
mod toml_config {
    use super::Config;
    use crate::error::TimerError;
    use serde::Deserialize;
    use std::path::Path;
    use std::time::Duration;

    #[derive(Debug, Deserialize)]
    struct RawConfig {
        pool_size: u32,
        #[serde(default = "default_wheel_width")]
        wheel_width: u32,
        #[serde(default = "default_tick_interval_ms")]
        tick_interval_ms: u64,
    }

    fn default_wheel_width() -> u32 {
        super::DEFAULT_WHEEL_WIDTH
    }

    fn default_tick_interval_ms() -> u64 {
        super::DEFAULT_TICK_INTERVAL.as_millis() as u64
    }

    impl Config {
        /// Load a [`Config`] from a TOML file.
        ///
        /// Expected shape:
        ///
        /// ```toml
        /// pool_size = 32
        /// wheel_width = 10
        /// tick_interval_ms = 100
        /// ```
        pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Config, TimerError> {
            let text = std::fs::read_to_string(path)
                .map_err(|_| TimerError::MallocErr("failed to read config file"))?;
            Self::from_toml_str(&text)
        }

        /// Parse a [`Config`] from a TOML string.
        pub fn from_toml_str(text: &str) -> Result<Config, TimerError> {
            let raw: RawConfig = toml::from_str(text)
                .map_err(|_| TimerError::MallocErr("failed to parse config file"))?;
            let config = Config {
                pool_size: raw.pool_size,
                wheel_width: raw.wheel_width,
                tick_interval: Duration::from_millis(raw.tick_interval_ms),
            };
            config.validate()?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = Config::builder()
            .pool_size(4)
            .wheel_width(8)
            .tick_interval(Duration::from_millis(5))
            .build()
            .unwrap();
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.wheel_width, 8);
        assert_eq!(config.tick_interval, Duration::from_millis(5));
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let err = Config::builder().pool_size(0).build().unwrap_err();
        assert_eq!(err, TimerError::MallocErr("pool_size must be greater than zero"));
    }

    #[test]
    fn zero_wheel_width_is_rejected() {
        let err = Config::builder().wheel_width(0).build().unwrap_err();
        assert!(matches!(err, TimerError::MallocErr(_)));
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let err = Config::builder()
            .tick_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, TimerError::MallocErr(_)));
    }

    #[cfg(feature = "config-toml")]
    #[test]
    fn parses_toml_config() {
        let config = Config::from_toml_str(
            r#"
            pool_size = 32
            wheel_width = 16
            tick_interval_ms = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.pool_size, 32);
        assert_eq!(config.wheel_width, 16);
        assert_eq!(config.tick_interval, Duration::from_millis(50));
    }
}
