//! Voting-power rosters.
//!
//! A roster is the committee's voting-power distribution snapshotted into
//! basis points. Slash-rate computation and reward splitting both consume
//! it, so the arithmetic is integer-only and the remainder handling is
//! fixed: every share is floored and any residue simply stays undistributed.

use crate::{Committee, Result, ShardError};
use meridian_crypto::SerializedPublicKey;
use meridian_types::Address;
use serde::{Deserialize, Serialize};

/// One basis point is 1/10_000.
pub const TOTAL_POWER_BPS: u64 = 10_000;

/// A slot's share of the committee's voting power.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteShare {
    /// Slot index within the committee
    pub slot_index: usize,
    /// Validator address holding the slot
    pub address: Address,
    /// BLS key the slot signs with
    pub bls_public_key: SerializedPublicKey,
    /// Share of total voting power, in basis points (floored)
    pub share_bps: u64,
}

/// The voting-power distribution of one committee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    /// Shard the roster belongs to
    pub shard_id: u32,
    /// Per-slot shares, in committee order
    pub shares: Vec<VoteShare>,
}

impl Roster {
    /// Computes the roster for a committee.
    ///
    /// Pre-staking committees split power equally across slots; staking-era
    /// committees split it proportionally to effective stake.
    pub fn compute(committee: &Committee, staking: bool) -> Result<Self> {
        if committee.slots.is_empty() {
            return Err(ShardError::QuorumInit(format!(
                "cannot build roster for empty committee of shard {}",
                committee.shard_id
            )));
        }

        let shares = if staking {
            let total = committee.total_effective_stake();
            if total == 0 {
                return Err(ShardError::QuorumInit(format!(
                    "committee for shard {} carries no effective stake",
                    committee.shard_id
                )));
            }
            committee
                .slots
                .iter()
                .enumerate()
                .map(|(i, slot)| VoteShare {
                    slot_index: i,
                    address: slot.address,
                    bls_public_key: slot.bls_public_key,
                    share_bps: (slot.effective_stake.unwrap_or(0)
                        .saturating_mul(TOTAL_POWER_BPS as u128)
                        / total) as u64,
                })
                .collect()
        } else {
            let per_slot = TOTAL_POWER_BPS / committee.slots.len() as u64;
            committee
                .slots
                .iter()
                .enumerate()
                .map(|(i, slot)| VoteShare {
                    slot_index: i,
                    address: slot.address,
                    bls_public_key: slot.bls_public_key,
                    share_bps: per_slot,
                })
                .collect()
        };

        Ok(Self {
            shard_id: committee.shard_id,
            shares,
        })
    }

    /// Sums the shares held by an address across all of its slots.
    pub fn share_by_address(&self, address: &Address) -> u64 {
        self.shares
            .iter()
            .filter(|s| &s.address == address)
            .map(|s| s.share_bps)
            .sum()
    }

    /// Sums the shares of the slots whose indices are listed.
    pub fn share_by_slots(&self, indices: &[usize]) -> u64 {
        self.shares
            .iter()
            .filter(|s| indices.contains(&s.slot_index))
            .map(|s| s.share_bps)
            .sum()
    }
}
