//! Dispatcher configuration
//!
//! The dispatcher itself only cares about one setting, the polling interval,
//! which bounds how long the worker may sleep before running the periodic
//! maintenance hook again when no task is submitted. The remaining settings
//! describe the worker thread.
//!
//! Configuration is usually read once at startup from a TOML file:
//!
//! ```toml
//! polling_interval_ms = 50
//! thread_name = "OnlineAsyncTaskThread"
//! stack_size = 131072
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;


/// Default worker wake-up period, in milliseconds
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 50;

/// Default worker thread name
pub const DEFAULT_THREAD_NAME: &str = "OnlineAsyncTaskThread";

/// Default worker stack size, in bytes
pub const DEFAULT_STACK_SIZE: usize = 128 * 1024;

/// Smallest accepted worker stack size, in bytes
const MIN_STACK_SIZE: usize = 16 * 1024;


/// Settings of a threaded dispatcher
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Upper bound on the worker's sleep between two iterations
    pub polling_interval_ms: u64,

    /// Name given to the worker thread
    pub thread_name: String,

    /// Stack size of the worker thread, in bytes
    pub stack_size: usize,
}
//
impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}
//
impl DispatcherConfig {
    /// Parse and validate a configuration from TOML text. Missing keys take
    /// their default value.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: DispatcherConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "polling_interval_ms",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.thread_name.is_empty() {
            return Err(ConfigError::Invalid {
                field: "thread_name",
                reason: "must not be empty".to_owned(),
            });
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::Invalid {
                field: "stack_size",
                reason: format!("must be at least {} bytes", MIN_STACK_SIZE),
            });
        }
        Ok(())
    }

    /// Set the polling interval, rounded up to the next millisecond
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        let millis = interval.as_nanos().div_ceil(1_000_000);
        self.polling_interval_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        self
    }

    /// Polling interval as a Duration
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }
}
