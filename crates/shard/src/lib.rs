//! # Meridian Shard
//!
//! Shard states and committees for the Meridian sharded blockchain.
//!
//! A [`ShardState`] is the per-epoch super-committee: one [`Committee`] per
//! shard, each an ordered sequence of validator [`Slot`]s (address, BLS
//! public key, optional effective stake). The crate also provides:
//!
//! - the canonical wrapper encoding of a shard state, whose byte layout
//!   differs before and after the staking activation epoch
//!   ([`encode_wrapper`] / [`decode_wrapper`])
//! - quorum verification over participation bitmaps ([`QuorumVerifier`]):
//!   one-slot-one-vote before staking, stake-weighted after
//! - voting-power rosters in basis points ([`votepower::Roster`])
//! - the deterministic genesis [`schedule::ShardSchedule`] from which
//!   pre-staking committees are recomputed

pub mod committee;
pub mod quorum;
pub mod schedule;
pub mod votepower;

pub use committee::{decode_wrapper, encode_wrapper, Committee, ShardState, Slot};
pub use quorum::QuorumVerifier;

/// The distinguished shard that owns committee selection and staking.
pub const BEACON_SHARD_ID: u32 = 0;

/// Result type for shard operations
pub type Result<T> = std::result::Result<T, ShardError>;

/// Errors that can occur while working with shard states.
#[derive(Debug, thiserror::Error)]
pub enum ShardError {
    /// The super-committee has no entry for the requested shard
    #[error("no committee found for shard {0}")]
    CommitteeNotFound(u32),

    /// Canonical encoding failed
    #[error("shard state encoding failed: {0}")]
    Encode(String),

    /// Canonical decoding failed
    #[error("shard state decoding failed: {0}")]
    Decode(String),

    /// A slot's BLS public key failed to decode
    #[error("slot public key decode failed: {0}")]
    KeyDecode(#[from] meridian_crypto::CryptoError),

    /// A quorum verifier could not be constructed for the committee
    #[error("quorum verifier init failed: {0}")]
    QuorumInit(String),
}
