//! Error types
//!
//! Only setup can fail in a recoverable way. Task failures are carried by the
//! tasks themselves, and calling the dispatcher from the wrong thread is a
//! programming error which panics.

use std::io;
use std::path::PathBuf;
use thiserror::Error;


/// Failure to bring up a dispatcher
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// The worker thread could not be created
    #[error("failed to spawn dispatcher worker thread '{name}'")]
    WorkerSpawn {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The configuration was rejected
    #[error(transparent)]
    Config(#[from] ConfigError),
}


/// Failure to load or validate a dispatcher configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read configuration file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration is not valid TOML, or does not have the right shape
    #[error("failed to parse configuration")]
    Parse(#[from] toml::de::Error),

    /// A configuration value is out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}
