//! Quorum verification over participation bitmaps.

use crate::{Committee, Result, ShardError};
use meridian_crypto::SignerMask;

/// Answers whether a participation mask reaches ≥2f+1 voting power under the
/// quorum policy active for the committee's era.
///
/// Before the staking epoch every slot carries one vote; after it, votes are
/// weighted by effective stake. Both policies require strictly more than
/// two-thirds of the total.
#[derive(Debug, Clone)]
pub enum QuorumVerifier {
    /// One slot, one vote (pre-staking era)
    UniformVote {
        /// Number of slots in the committee
        slot_count: usize,
    },
    /// Stake-weighted voting (staking era)
    StakeWeighted {
        /// Effective stake per slot, in committee order (unstaked slots
        /// count zero)
        stakes: Vec<u128>,
        /// Total effective stake across all slots
        total: u128,
    },
}

impl QuorumVerifier {
    /// Builds a verifier for a committee, parameterized by the staking-era
    /// flag of the committee's epoch.
    pub fn new(committee: &Committee, staking: bool) -> Result<Self> {
        if committee.slots.is_empty() {
            return Err(ShardError::QuorumInit(format!(
                "committee for shard {} has no slots",
                committee.shard_id
            )));
        }
        if !staking {
            return Ok(Self::UniformVote {
                slot_count: committee.slots.len(),
            });
        }
        let stakes: Vec<u128> = committee
            .slots
            .iter()
            .map(|slot| slot.effective_stake.unwrap_or(0))
            .collect();
        let total: u128 = stakes.iter().sum();
        if total == 0 {
            return Err(ShardError::QuorumInit(format!(
                "committee for shard {} carries no effective stake",
                committee.shard_id
            )));
        }
        Ok(Self::StakeWeighted { stakes, total })
    }

    /// Checks whether the mask's signers hold strictly more than two-thirds
    /// of the committee's voting power.
    pub fn is_quorum_achieved(&self, mask: &SignerMask<'_>) -> bool {
        match self {
            Self::UniformVote { slot_count } => mask.count_enabled() * 3 > slot_count * 2,
            Self::StakeWeighted { stakes, total } => {
                let signed: u128 = stakes
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask.is_set(*i))
                    .map(|(_, stake)| stake)
                    .sum();
                signed * 3 > total * 2
            }
        }
    }
}
