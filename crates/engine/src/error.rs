//! Engine error taxonomy.
//!
//! Verification errors are recoverable: the block is rejected and the node
//! keeps serving. Finalization errors are fatal to the block under
//! construction - the caller must discard the partially mutated state.

use meridian_types::H256;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by header verification and block finalization.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The parent header is not present locally
    #[error("unknown ancestor: parent of block {number} not found")]
    UnknownAncestor {
        /// Number of the block whose parent is missing
        number: u64,
    },

    /// The aggregate BLS signature did not verify over the commit payload
    #[error("aggregate signature verification failed for block {hash}")]
    SignatureMismatch {
        /// Hash of the block whose commit failed
        hash: H256,
    },

    /// The participation bitmap does not reach 2f+1 voting power
    #[error("insufficient quorum: commit bitmap does not reach 2f+1 voting power")]
    InsufficientQuorum,

    /// The serialized signature or bitmap is malformed
    #[error("signature decode failed: {0}")]
    SignatureDecode(#[from] meridian_crypto::CryptoError),

    /// The header's encoded shard state differs from the recomputed one
    #[error("shard state in header does not match the recomputed committee")]
    ShardStateMismatch,

    /// The shard state for an epoch could not be resolved
    #[error("missing shard state for epoch {epoch}: {reason}")]
    MissingShardState {
        /// Epoch whose shard state is unavailable
        epoch: u64,
        /// Why resolution failed
        reason: String,
    },

    /// The engine was asked to verify a header for a different shard
    #[error("shard id mismatch: chain is shard {local}, header is for shard {header}")]
    ShardIdMismatch {
        /// The local chain's shard
        local: u32,
        /// The header's shard
        header: u32,
    },

    /// Double signers were supplied outside the beacon chain or staking era
    #[error("slashes proposed on non-beacon chain or outside the staking era")]
    SlashesInWrongChain,

    /// The commit-signature signal reported failure or closed early
    #[error("commit signatures were not ready at finalization")]
    SigsNotReady,

    /// Committee lookup, key decode or quorum construction failed
    #[error(transparent)]
    Shard(#[from] meridian_shard::ShardError),

    /// Validator lookup or slash application failed
    #[error(transparent)]
    Staking(#[from] meridian_staking::StakingError),
}
