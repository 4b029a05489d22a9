//! Double-sign slashing: evidence records, rate computation and application.
//!
//! A slash record carries the proof that one validator signed two
//! conflicting blocks at the same (shard, height, view). The rate scales
//! with the offenders' voting power so that coordinated double-signing is
//! punished harder than a lone misconfigured node; application debits every
//! delegation the offender holds, rewards the reporter with half of what was
//! taken, burns the rest, and bans the offender.

use crate::{EposStatus, Result, StateDB};
use meridian_crypto::{SerializedPublicKey, SerializedSignature};
use meridian_shard::votepower::{Roster, TOTAL_POWER_BPS};
use meridian_types::{Address, H256};
use serde::{Deserialize, Serialize};

/// Floor slash rate: 2% even for the smallest offender.
pub const MIN_DOUBLE_SIGN_RATE_BPS: u64 = 200;

/// One of the two conflicting commit votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// The BLS key that produced the signature
    pub signer_public_key: SerializedPublicKey,
    /// Header hash the vote committed to
    pub block_header_hash: H256,
    /// The commit signature itself
    pub signature: SerializedSignature,
}

/// The pair of votes proving the double sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictingVotes {
    /// First observed vote
    pub first: Vote,
    /// Conflicting vote for a different header at the same moment
    pub second: Vote,
}

/// The chain coordinates at which the offense happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Moment {
    /// Epoch of the offense
    pub epoch: u64,
    /// Shard on which both blocks were proposed
    pub shard_id: u32,
    /// Block height of the conflicting proposals
    pub height: u64,
    /// Consensus view of the conflicting proposals
    pub view_id: u64,
}

/// Proof of a double sign by one validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Where the offense happened
    pub moment: Moment,
    /// The two conflicting votes
    pub votes: ConflictingVotes,
    /// The offending validator
    pub offender: Address,
}

/// A slash as submitted on chain: evidence plus who reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The double-sign proof
    pub evidence: Evidence,
    /// The account that submitted the evidence, paid the beneficiary reward
    pub reporter: Address,
}

/// A batch of slash records.
pub type Records = Vec<Record>;

/// Summary of an applied slash group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Total debited from offenders' delegations and pending undelegations
    pub total_slashed: u128,
    /// Total credited to reporters (half of the slashed amount; the rest is
    /// burned)
    pub total_beneficiary_reward: u128,
}

/// Computes the slash rate for a group of records, in basis points.
///
/// The rate is the sum of the offenders' voting-power shares in the
/// committee the offense was committed against, clamped to
/// `[MIN_DOUBLE_SIGN_RATE_BPS, TOTAL_POWER_BPS]`.
pub fn rate(roster: &Roster, records: &[Record]) -> u64 {
    let summed: u64 = records
        .iter()
        .map(|r| roster.share_by_address(&r.evidence.offender))
        .sum();
    summed.clamp(MIN_DOUBLE_SIGN_RATE_BPS, TOTAL_POWER_BPS)
}

/// Applies a group of slash records against state at the given rate.
///
/// For each record: every delegation of the offender, pending undelegations
/// included, is debited by the rate; the reporter receives half of what the
/// record slashed; the offender is banned. Records must already be in
/// canonical order - application order is visible in the state root.
pub fn apply(
    state: &mut dyn StateDB,
    records: &[Record],
    rate_bps: u64,
) -> Result<Application> {
    let mut application = Application::default();

    for record in records {
        let offender = &record.evidence.offender;
        let mut wrapper = state.validator_wrapper(offender)?;

        let mut record_slashed = 0u128;
        for delegation in &mut wrapper.delegations {
            let cut = proportion(delegation.amount, rate_bps);
            delegation.amount -= cut;
            record_slashed += cut;
            for undelegation in &mut delegation.undelegations {
                let cut = proportion(undelegation.amount, rate_bps);
                undelegation.amount -= cut;
                record_slashed += cut;
            }
        }
        wrapper.status = EposStatus::Banned;
        state.update_validator_wrapper(offender, wrapper)?;

        let reward = record_slashed / 2;
        if reward > 0 {
            state.add_balance(&record.reporter, reward);
        }
        application.total_slashed += record_slashed;
        application.total_beneficiary_reward += reward;
    }

    Ok(application)
}

fn proportion(amount: u128, rate_bps: u64) -> u128 {
    amount.saturating_mul(rate_bps as u128) / TOTAL_POWER_BPS as u128
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Delegation, StakingError, Undelegation, ValidatorWrapper};
    use meridian_shard::votepower::VoteShare;
    use std::collections::HashMap;

    fn record(offender: Address, reporter: Address) -> Record {
        Record {
            evidence: Evidence {
                moment: Moment {
                    epoch: 3,
                    shard_id: 0,
                    height: 10,
                    view_id: 11,
                },
                votes: ConflictingVotes {
                    first: Vote {
                        signer_public_key: SerializedPublicKey::default(),
                        block_header_hash: H256::keccak256(b"a"),
                        signature: SerializedSignature::default(),
                    },
                    second: Vote {
                        signer_public_key: SerializedPublicKey::default(),
                        block_header_hash: H256::keccak256(b"b"),
                        signature: SerializedSignature::default(),
                    },
                },
                offender,
            },
            reporter,
        }
    }

    fn roster(shares: &[(Address, u64)]) -> Roster {
        Roster {
            shard_id: 0,
            shares: shares
                .iter()
                .enumerate()
                .map(|(i, &(address, share_bps))| VoteShare {
                    slot_index: i,
                    address,
                    bls_public_key: SerializedPublicKey::default(),
                    share_bps,
                })
                .collect(),
        }
    }

    #[derive(Default)]
    struct MemState {
        wrappers: HashMap<Address, ValidatorWrapper>,
        balances: HashMap<Address, u128>,
    }

    impl StateDB for MemState {
        fn validator_wrapper(&self, address: &Address) -> Result<ValidatorWrapper> {
            self.wrappers
                .get(address)
                .cloned()
                .ok_or(StakingError::ValidatorLookup(*address))
        }

        fn update_validator_wrapper(
            &mut self,
            address: &Address,
            wrapper: ValidatorWrapper,
        ) -> Result<()> {
            self.wrappers.insert(*address, wrapper);
            Ok(())
        }

        fn add_balance(&mut self, address: &Address, amount: u128) {
            *self.balances.entry(*address).or_default() += amount;
        }

        fn intermediate_root(&mut self, _is_s3: bool) -> H256 {
            H256::NIL
        }
    }

    #[test]
    fn rate_sums_offender_shares_with_floor_and_cap() {
        let offender_a = Address::new([1u8; 20]);
        let offender_b = Address::new([2u8; 20]);
        let reporter = Address::new([9u8; 20]);
        let roster = roster(&[(offender_a, 3000), (offender_b, 50)]);

        let both = vec![
            record(offender_a, reporter),
            record(offender_b, reporter),
        ];
        assert_eq!(rate(&roster, &both), 3050);

        // A tiny offender still pays the floor rate.
        let small = vec![record(offender_b, reporter)];
        assert_eq!(rate(&roster, &small), MIN_DOUBLE_SIGN_RATE_BPS);

        // Shares can never push past 100%.
        let packed = roster_with_total(offender_a, 12_000);
        assert_eq!(
            rate(&packed, &vec![record(offender_a, reporter)]),
            TOTAL_POWER_BPS
        );
    }

    fn roster_with_total(address: Address, share_bps: u64) -> Roster {
        roster(&[(address, share_bps)])
    }

    #[test]
    fn apply_debits_delegations_and_rewards_reporter() {
        let offender = Address::new([1u8; 20]);
        let delegator = Address::new([2u8; 20]);
        let reporter = Address::new([9u8; 20]);

        let mut state = MemState::default();
        let mut wrapper = ValidatorWrapper::new(offender, 10_000);
        wrapper.delegations.push(Delegation {
            delegator_address: delegator,
            amount: 5_000,
            undelegations: vec![Undelegation {
                amount: 1_000,
                epoch: 2,
            }],
        });
        state.wrappers.insert(offender, wrapper);

        // 10% rate: 1000 + 500 + 100 slashed.
        let summary = apply(&mut state, &[record(offender, reporter)], 1_000).unwrap();
        assert_eq!(summary.total_slashed, 1_600);
        assert_eq!(summary.total_beneficiary_reward, 800);
        assert_eq!(state.balances[&reporter], 800);

        let slashed = &state.wrappers[&offender];
        assert_eq!(slashed.delegations[0].amount, 9_000);
        assert_eq!(slashed.delegations[1].amount, 4_500);
        assert_eq!(slashed.delegations[1].undelegations[0].amount, 900);
        assert_eq!(slashed.status, EposStatus::Banned);
    }

    #[test]
    fn apply_missing_offender_fails() {
        let mut state = MemState::default();
        let offender = Address::new([1u8; 20]);
        let reporter = Address::new([9u8; 20]);
        assert!(matches!(
            apply(&mut state, &[record(offender, reporter)], 1_000),
            Err(StakingError::ValidatorLookup(_))
        ));
    }
}
