//! # Meridian Engine
//!
//! The block-finalization and header-verification core of the Meridian
//! sharded BFT chain. For every candidate block the engine decides:
//!
//! - whether the block is legitimately signed by ≥2f+1 voting power of the
//!   proper committee for its epoch ([`Engine::verify_header`],
//!   [`Engine::verify_header_signature`], [`Engine::verify_shard_state`]),
//!   and
//! - how the world state must be mutated when the block is finalized
//!   ([`Engine::finalize`]): paying out matured undelegations, recording
//!   committee transitions, accumulating block rewards and signer credit,
//!   and applying double-sign slashes deterministically.
//!
//! Every honest node must reach bit-identical answers from the same inputs;
//! the epoch-context and verified-signature caches are therefore purely
//! local accelerators over computations that are deterministic functions of
//! on-chain state.
//!
//! The engine consumes chain data through the [`ChainReader`] trait and
//! mutates world state through the [`StateDB`] trait; pre-staking cross-shard
//! committees are recomputed through an injected [`CommitteeSelector`].

mod context;
mod engine;
mod error;
pub mod reward;
pub mod signature;
mod traits;

pub use context::BITMAP_KEY_BYTES;
pub use engine::{is_committee_selection_block, lock_period_in_epochs, Engine};
pub use error::{EngineError, Result};
pub use reward::{Payout, RewardReport};
pub use traits::{ChainReader, CommitteeSelector, GenesisSelector};

pub use meridian_staking::StateDB;
