//! Canonical commit payload construction.
//!
//! Commit signatures are computed over this exact byte layout by the
//! consensus proposer and verified against it here. Any deviation between
//! the two flips block validity cluster-wide, so the layout is fixed:
//! little-endian 8-byte epoch, 32-byte block hash, little-endian 8-byte
//! block number, little-endian 8-byte view id.

use meridian_types::H256;

/// Byte length of a commit payload.
pub const COMMIT_PAYLOAD_BYTES: usize = 8 + 32 + 8 + 8;

/// Constructs the canonical commit payload for a block.
pub fn construct_commit_payload(
    epoch: u64,
    block_hash: &H256,
    block_number: u64,
    view_id: u64,
) -> Vec<u8> {
    let mut payload = Vec::with_capacity(COMMIT_PAYLOAD_BYTES);
    payload.extend_from_slice(&epoch.to_le_bytes());
    payload.extend_from_slice(block_hash.as_bytes());
    payload.extend_from_slice(&block_number.to_le_bytes());
    payload.extend_from_slice(&view_id.to_le_bytes());
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_layout() {
        let hash = H256::keccak256(b"block");
        let payload = construct_commit_payload(3, &hash, 100, 7);
        assert_eq!(payload.len(), COMMIT_PAYLOAD_BYTES);
        assert_eq!(&payload[..8], &3u64.to_le_bytes());
        assert_eq!(&payload[8..40], hash.as_bytes());
        assert_eq!(&payload[40..48], &100u64.to_le_bytes());
        assert_eq!(&payload[48..56], &7u64.to_le_bytes());
    }

    #[test]
    fn every_field_matters() {
        let hash = H256::keccak256(b"block");
        let base = construct_commit_payload(3, &hash, 100, 7);
        assert_ne!(base, construct_commit_payload(4, &hash, 100, 7));
        assert_ne!(base, construct_commit_payload(3, &H256::NIL, 100, 7));
        assert_ne!(base, construct_commit_payload(3, &hash, 101, 7));
        assert_ne!(base, construct_commit_payload(3, &hash, 100, 8));
    }
}
