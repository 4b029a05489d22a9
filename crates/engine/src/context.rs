//! Epoch contexts and the verification caches' key types.

use meridian_crypto::{BlsPublicKey, SerializedSignature, SIGNATURE_BYTES};
use meridian_shard::QuorumVerifier;
use meridian_types::H256;

/// Epoch-context cache capacity: a few active epochs plus cross-shard
/// lookups.
pub(crate) const EPOCH_CTX_CACHE: usize = 20;

/// Verified-signature memo capacity.
pub(crate) const VERIFIED_SIG_CACHE: usize = 20;

/// Voting-power roster cache capacity.
pub(crate) const VOTING_POWER_CACHE: usize = 20;

/// Fixed width of the bitmap component of a verified-signature key.
///
/// Bitmaps are zero-padded to this width (supporting up to 512 validators)
/// so that keys compare bit-for-bit.
pub const BITMAP_KEY_BYTES: usize = 64;

/// Cache key for epoch contexts; equality is field-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EpochCtxKey {
    pub shard_id: u32,
    pub epoch: u64,
}

/// The committee data needed to verify commits for one `(shard, epoch)`.
///
/// A pure function of on-chain state at that epoch - once built it never
/// changes, so caching is always safe.
pub(crate) struct EpochCtx {
    /// Ordered BLS public keys of the committee slots
    pub pub_keys: Vec<BlsPublicKey>,
    /// Quorum policy for the committee's era
    pub verifier: QuorumVerifier,
}

/// Memo key for positively verified commits.
///
/// All three components uniquely fix the verification result, so a cached
/// positive verdict never goes stale. Only positive verdicts are memoized;
/// failures re-run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct VerifiedSigKey {
    block_hash: H256,
    signature: [u8; SIGNATURE_BYTES],
    bitmap: [u8; BITMAP_KEY_BYTES],
}

impl VerifiedSigKey {
    /// Builds a key, zero-padding the bitmap to its fixed width.
    ///
    /// Callers must have rejected bitmaps longer than [`BITMAP_KEY_BYTES`]
    /// at decode time; the excess is truncated here rather than aliased.
    pub(crate) fn new(block_hash: H256, signature: &SerializedSignature, bitmap: &[u8]) -> Self {
        let mut key_bitmap = [0u8; BITMAP_KEY_BYTES];
        let len = bitmap.len().min(BITMAP_KEY_BYTES);
        key_bitmap[..len].copy_from_slice(&bitmap[..len]);
        Self {
            block_hash,
            signature: signature.0,
            bitmap: key_bitmap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_is_zero_padded() {
        let sig = SerializedSignature::default();
        let a = VerifiedSigKey::new(H256::NIL, &sig, &[0b0000_0101]);
        let b = VerifiedSigKey::new(H256::NIL, &sig, &[0b0000_0101, 0x00]);
        // Same logical mask, different raw lengths: identical keys.
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_components_give_distinct_keys() {
        let sig = SerializedSignature::default();
        let base = VerifiedSigKey::new(H256::NIL, &sig, &[1]);
        assert_ne!(base, VerifiedSigKey::new(H256::keccak256(b"x"), &sig, &[1]));
        assert_ne!(
            base,
            VerifiedSigKey::new(H256::NIL, &SerializedSignature([1u8; 96]), &[1])
        );
        assert_ne!(base, VerifiedSigKey::new(H256::NIL, &sig, &[2]));
    }
}
