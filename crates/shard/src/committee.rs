//! Shard states, committees and the canonical wrapper encoding.

use crate::{Result, ShardError};
use meridian_crypto::{BlsPublicKey, SerializedPublicKey, PUBLIC_KEY_BYTES};
use meridian_types::Address;
use rlp::{Rlp, RlpStream};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A validator slot inside a committee.
///
/// `effective_stake` is `None` for pre-staking slots (one slot, one vote) and
/// carries the EPoS effective stake once the staking era is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Validator address holding the slot
    pub address: Address,
    /// BLS public key the slot signs with
    pub bls_public_key: SerializedPublicKey,
    /// Effective stake backing the slot (staking era only)
    pub effective_stake: Option<u128>,
}

impl Slot {
    /// Creates a pre-staking slot.
    pub fn new(address: Address, bls_public_key: SerializedPublicKey) -> Self {
        Self {
            address,
            bls_public_key,
            effective_stake: None,
        }
    }

    /// Creates a staked slot.
    pub fn staked(
        address: Address,
        bls_public_key: SerializedPublicKey,
        effective_stake: u128,
    ) -> Self {
        Self {
            address,
            bls_public_key,
            effective_stake: Some(effective_stake),
        }
    }
}

/// The committee responsible for one shard in one epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committee {
    /// Shard the committee produces blocks for
    pub shard_id: u32,
    /// Ordered validator slots; slot order is consensus-critical
    pub slots: Vec<Slot>,
}

impl Committee {
    /// Decodes the ordered BLS public keys of all slots.
    ///
    /// Fails on the first slot whose key is not a valid canonical G1 point.
    pub fn bls_public_keys(&self) -> Result<Vec<BlsPublicKey>> {
        self.slots
            .iter()
            .map(|slot| slot.bls_public_key.decode().map_err(ShardError::from))
            .collect()
    }

    /// Returns the addresses of staked slot holders, deduplicated in slot
    /// order.
    pub fn staked_validators(&self) -> Vec<Address> {
        let mut seen = HashSet::new();
        self.slots
            .iter()
            .filter(|slot| slot.effective_stake.is_some())
            .filter(|slot| seen.insert(slot.address))
            .map(|slot| slot.address)
            .collect()
    }

    /// Total effective stake across all slots.
    pub fn total_effective_stake(&self) -> u128 {
        self.slots
            .iter()
            .filter_map(|slot| slot.effective_stake)
            .sum()
    }
}

/// The per-epoch super-committee: one committee per shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardState {
    /// Epoch this shard state is valid for
    pub epoch: u64,
    /// Committees, one per shard
    pub shards: Vec<Committee>,
}

impl ShardState {
    /// Locates the committee for a shard.
    pub fn find_committee(&self, shard_id: u32) -> Result<&Committee> {
        self.shards
            .iter()
            .find(|c| c.shard_id == shard_id)
            .ok_or(ShardError::CommitteeNotFound(shard_id))
    }

    /// Returns the staked validator addresses across all committees,
    /// deduplicated in shard-then-slot order.
    pub fn staked_validators(&self) -> Vec<Address> {
        let mut seen = HashSet::new();
        self.shards
            .iter()
            .flat_map(|c| c.slots.iter())
            .filter(|slot| slot.effective_stake.is_some())
            .filter(|slot| seen.insert(slot.address))
            .map(|slot| slot.address)
            .collect()
    }
}

// Wire layouts. The pre-staking (legacy) form encodes slots as two-item
// lists; the staking form appends a presence flag and the effective stake.
// Byte-exact equality of this encoding is a block-validity criterion, so the
// two layouts must never drift.

const LEGACY_SLOT_ITEMS: usize = 2;
const STAKING_SLOT_ITEMS: usize = 4;

/// Encodes a shard state with the canonical wrapper layout.
///
/// `staking` selects the staking-era layout; it must be derived from the
/// shard state's own epoch by the caller.
pub fn encode_wrapper(state: &ShardState, staking: bool) -> Result<Vec<u8>> {
    let mut stream = RlpStream::new_list(2);
    stream.append(&state.epoch);
    stream.begin_list(state.shards.len());
    for committee in &state.shards {
        stream.begin_list(2);
        stream.append(&committee.shard_id);
        stream.begin_list(committee.slots.len());
        for slot in &committee.slots {
            if staking {
                stream.begin_list(STAKING_SLOT_ITEMS);
                stream.append(&slot.address);
                stream.append(&slot.bls_public_key.as_bytes().to_vec());
                match slot.effective_stake {
                    Some(stake) => {
                        stream.append(&1u8);
                        stream.append(&stake);
                    }
                    None => {
                        stream.append(&0u8);
                        stream.append(&0u128);
                    }
                }
            } else {
                stream.begin_list(LEGACY_SLOT_ITEMS);
                stream.append(&slot.address);
                stream.append(&slot.bls_public_key.as_bytes().to_vec());
            }
        }
    }
    Ok(stream.out().to_vec())
}

/// Decodes a shard state from its canonical wrapper encoding.
///
/// Accepts both the staking and the legacy layout; the slot item count
/// disambiguates.
pub fn decode_wrapper(bytes: &[u8]) -> Result<ShardState> {
    let rlp = Rlp::new(bytes);
    let item_count = rlp
        .item_count()
        .map_err(|e| ShardError::Decode(e.to_string()))?;
    if item_count != 2 {
        return Err(ShardError::Decode(format!(
            "expected 2 top-level items, got {}",
            item_count
        )));
    }

    let epoch: u64 = rlp
        .val_at(0)
        .map_err(|e| ShardError::Decode(e.to_string()))?;
    let shards_rlp = rlp.at(1).map_err(|e| ShardError::Decode(e.to_string()))?;
    let shard_count = shards_rlp
        .item_count()
        .map_err(|e| ShardError::Decode(e.to_string()))?;

    let mut shards = Vec::with_capacity(shard_count);
    for i in 0..shard_count {
        let committee_rlp = shards_rlp
            .at(i)
            .map_err(|e| ShardError::Decode(e.to_string()))?;
        let shard_id: u32 = committee_rlp
            .val_at(0)
            .map_err(|e| ShardError::Decode(e.to_string()))?;
        let slots_rlp = committee_rlp
            .at(1)
            .map_err(|e| ShardError::Decode(e.to_string()))?;
        let slot_count = slots_rlp
            .item_count()
            .map_err(|e| ShardError::Decode(e.to_string()))?;

        let mut slots = Vec::with_capacity(slot_count);
        for j in 0..slot_count {
            let slot_rlp = slots_rlp
                .at(j)
                .map_err(|e| ShardError::Decode(e.to_string()))?;
            let items = slot_rlp
                .item_count()
                .map_err(|e| ShardError::Decode(e.to_string()))?;

            let address: Address = slot_rlp
                .val_at(0)
                .map_err(|e| ShardError::Decode(e.to_string()))?;
            let key_bytes: Vec<u8> = slot_rlp
                .val_at(1)
                .map_err(|e| ShardError::Decode(e.to_string()))?;
            if key_bytes.len() != PUBLIC_KEY_BYTES {
                return Err(ShardError::Decode(format!(
                    "slot public key has {} bytes, want {}",
                    key_bytes.len(),
                    PUBLIC_KEY_BYTES
                )));
            }
            let mut key = [0u8; PUBLIC_KEY_BYTES];
            key.copy_from_slice(&key_bytes);

            let effective_stake = match items {
                LEGACY_SLOT_ITEMS => None,
                STAKING_SLOT_ITEMS => {
                    let present: u8 = slot_rlp
                        .val_at(2)
                        .map_err(|e| ShardError::Decode(e.to_string()))?;
                    let stake: u128 = slot_rlp
                        .val_at(3)
                        .map_err(|e| ShardError::Decode(e.to_string()))?;
                    (present == 1).then_some(stake)
                }
                other => {
                    return Err(ShardError::Decode(format!(
                        "slot with {} items is neither legacy nor staking layout",
                        other
                    )))
                }
            };

            slots.push(Slot {
                address,
                bls_public_key: SerializedPublicKey(key),
                effective_stake,
            });
        }
        shards.push(Committee { shard_id, slots });
    }

    Ok(ShardState { epoch, shards })
}
