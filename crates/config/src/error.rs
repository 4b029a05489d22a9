//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        /// Path that failed to read
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse the TOML content
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Chain id must be non-zero
    #[error("chain_id must be non-zero")]
    InvalidChainId,

    /// A balance-like field does not parse as an integer
    #[error("invalid balance value: {0}")]
    InvalidBalance(String),

    /// Two fork epochs are ordered inconsistently
    #[error("fork `{later}` ({later_epoch}) activates before `{earlier}` ({earlier_epoch})")]
    ForkOrdering {
        /// Name of the fork that must come first
        earlier: &'static str,
        /// Its configured epoch
        earlier_epoch: u64,
        /// Name of the fork that must not precede it
        later: &'static str,
        /// Its configured epoch
        later_epoch: u64,
    },
}
