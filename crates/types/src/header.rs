//! Block header carrying the parent commit and the epoch's shard state.

use crate::{Address, H256};
use meridian_crypto::SerializedSignature;
use rlp::RlpStream;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A Meridian block header.
///
/// Each header carries the aggregated commit signature and participation
/// bitmap **for its parent block**: a block is only sealed once its successor
/// proves the committee committed to it. At epoch boundaries the header also
/// carries the encoded shard state for the next epoch.
///
/// The finalizer mutates a header only through [`set_view_id`] and
/// [`set_state_root`] before sealing; every other field is fixed at proposal
/// time.
///
/// [`set_view_id`]: Header::set_view_id
/// [`set_state_root`]: Header::set_state_root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Shard this block belongs to (shard 0 is the beacon shard)
    pub shard_id: u32,
    /// Block number within the shard chain
    pub number: u64,
    /// Epoch the block belongs to
    pub epoch: u64,
    /// Consensus view in which the block was committed
    pub view_id: u64,
    /// Hash of the parent block
    pub parent_hash: H256,
    /// Unix timestamp in seconds
    pub timestamp: u64,
    /// Address of the block proposer
    pub proposer: Address,
    /// Merkle root of the world state after this block
    pub state_root: H256,
    /// Whether this is the last block of its epoch
    pub last_in_epoch: bool,
    /// Canonical wrapper encoding of the next epoch's shard state
    /// (empty outside committee-selection blocks, or when withheld)
    #[serde(with = "hex_bytes")]
    pub shard_state: Vec<u8>,
    /// Aggregated BLS commit signature for the parent block
    pub last_commit_signature: SerializedSignature,
    /// Participation bitmap for the parent block's commit
    #[serde(with = "hex_bytes")]
    pub last_commit_bitmap: Vec<u8>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            shard_id: 0,
            number: 0,
            epoch: 0,
            view_id: 0,
            parent_hash: H256::NIL,
            timestamp: 0,
            proposer: Address::ZERO,
            state_root: H256::NIL,
            last_in_epoch: false,
            shard_state: Vec::new(),
            last_commit_signature: SerializedSignature::default(),
            last_commit_bitmap: Vec::new(),
        }
    }
}

impl Header {
    /// Computes the hash of this header (Keccak256 of the RLP encoding).
    pub fn hash(&self) -> H256 {
        H256::keccak256(&self.rlp_encode())
    }

    /// RLP encodes the header.
    pub fn rlp_encode(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(12);
        stream.append(&self.shard_id);
        stream.append(&self.number);
        stream.append(&self.epoch);
        stream.append(&self.view_id);
        stream.append(&self.parent_hash);
        stream.append(&self.timestamp);
        stream.append(&self.proposer);
        stream.append(&self.state_root);
        stream.append(&(self.last_in_epoch as u8));
        stream.append(&self.shard_state);
        stream.append(&self.last_commit_signature.as_bytes().to_vec());
        stream.append(&self.last_commit_bitmap);
        stream.out().to_vec()
    }

    /// Stamps the view id during finalization.
    pub fn set_view_id(&mut self, view_id: u64) {
        self.view_id = view_id;
    }

    /// Commits the state root during finalization.
    pub fn set_state_root(&mut self, root: H256) {
        self.state_root = root;
    }

    /// Checks whether the header carries a shard-state blob.
    pub fn has_shard_state(&self) -> bool {
        !self.shard_state.is_empty()
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Header #{} (shard: {}, epoch: {}, hash: {})",
            self.number,
            self.shard_id,
            self.epoch,
            self.hash()
        )
    }
}

/// Serde helper for serializing byte vectors as hex.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
