//! # Meridian Config
//!
//! Chain configuration for the Meridian blockchain, following the
//! single-config philosophy: one TOML file describes the chain identity, the
//! fork-epoch schedule and the economic parameters.
//!
//! Fork activations are never compared against magic numbers elsewhere in the
//! codebase; they are consulted exclusively through the named predicates on
//! [`ChainConfig`] (`is_staking`, `is_pre_staking`, `is_quick_unlock`, ...).

pub mod config;
pub mod error;

pub use config::{ChainConfig, ForkSchedule};
pub use error::{ConfigError, ConfigResult};
