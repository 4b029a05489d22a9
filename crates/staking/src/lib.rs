//! # Meridian Staking
//!
//! Validator and delegation records for the Meridian staking system, plus
//! the two consensus-critical computations that mutate them at block
//! finalization:
//!
//! - **EPoS availability** ([`availability`]) - recomputes a validator's
//!   eligibility from its signing record at every committee-selection block
//! - **Double-sign slashing** ([`slash`]) - slash-rate computation from
//!   voting power and deterministic application against state
//!
//! The crate also defines the [`StateDB`] abstraction through which all
//! state mutation flows during finalization.

pub mod availability;
pub mod slash;
pub mod state;
pub mod validator;

pub use state::StateDB;
pub use validator::{
    Delegation, EposStatus, SigningCounters, Undelegation, ValidatorWrapper,
    LOCK_PERIOD_IN_EPOCHS, LOCK_PERIOD_IN_EPOCHS_V2,
};

/// Result type for staking operations
pub type Result<T> = std::result::Result<T, StakingError>;

/// Errors that can occur in staking computations.
#[derive(Debug, thiserror::Error)]
pub enum StakingError {
    /// State has no record for the requested validator
    #[error("validator {0} not found in state")]
    ValidatorLookup(meridian_types::Address),

    /// A slash could not be computed or applied
    #[error("slash application failed: {0}")]
    SlashApplication(String),
}
