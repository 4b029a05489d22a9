//! Block-reward accumulation and signer crediting.
//!
//! Runs as phase 2 of finalization, after the committee-selection
//! bookkeeping and before slashing. It must observe the `sigs_ready` signal
//! before touching the header's commit data: the signatures are populated
//! asynchronously by the consensus layer and the header is not trustworthy
//! until the signal fires.

use crate::{ChainReader, EngineError, Result, StateDB};
use meridian_crypto::SignerMask;
use meridian_shard::votepower::Roster;
use meridian_types::{Address, Header};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::debug;

/// One address's share of a block reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Payout {
    /// The credited account
    pub address: Address,
    /// Amount credited
    pub amount: u128,
}

/// What a finalized block paid out, and to whom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewardReport {
    /// Per-address payouts in committee slot order
    pub payouts: Vec<Payout>,
}

impl RewardReport {
    /// Total amount paid out by the block.
    pub fn total(&self) -> u128 {
        self.payouts.iter().map(|p| p.amount).sum()
    }
}

/// Accumulates the block reward and credits signer counters.
///
/// Waits on `sigs_ready`; a `false` or closed signal aborts finalization.
/// The header's own commit bitmap attests the **parent** block, so the
/// committee is resolved at the parent's epoch - through `beacon` when the
/// local chain no longer retains that shard state.
///
/// In the staking era every slot holder's `blocks_to_sign` is incremented
/// and signers additionally earn `blocks_signed`; the block reward is split
/// among signers proportionally to voting power (equally before staking).
pub fn accumulate_rewards_and_count_sigs(
    chain: &dyn ChainReader,
    state: &mut dyn StateDB,
    header: &Header,
    beacon: Option<Arc<dyn ChainReader>>,
    sigs_ready: Receiver<bool>,
) -> Result<RewardReport> {
    match sigs_ready.recv() {
        Ok(true) => {}
        _ => return Err(EngineError::SigsNotReady),
    }

    // Genesis and the first block carry no parent commit.
    if header.number <= 1 {
        return Ok(RewardReport::default());
    }

    let parent = chain
        .get_header(&header.parent_hash, header.number - 1)
        .ok_or(EngineError::UnknownAncestor {
            number: header.number,
        })?;

    let shard_state = match chain.read_shard_state(parent.epoch) {
        Ok(state) => state,
        Err(err) => match &beacon {
            Some(beacon) => beacon.read_shard_state(parent.epoch)?,
            None => return Err(err),
        },
    };
    let committee = shard_state.find_committee(header.shard_id)?;
    let keys = committee.bls_public_keys()?;
    let mask = SignerMask::from_bitmap(&keys, &header.last_commit_bitmap)
        .map_err(EngineError::SignatureDecode)?;

    let staking = chain.config().is_staking(parent.epoch);

    if staking {
        count_signatures(state, committee, &mask)?;
    }

    let report = pay_block_reward(chain, state, committee, &mask, staking)?;
    debug!(
        block = header.number,
        shard = header.shard_id,
        signers = mask.count_enabled(),
        total_payout = report.total(),
        "accumulated block rewards"
    );
    Ok(report)
}

/// Credits `blocks_to_sign` for every slot holder and `blocks_signed` for
/// the slots set in the mask.
fn count_signatures(
    state: &mut dyn StateDB,
    committee: &meridian_shard::Committee,
    mask: &SignerMask<'_>,
) -> Result<()> {
    // Aggregate per address first: a validator holding several slots gets
    // one counter update covering all of them.
    let mut order: Vec<Address> = Vec::new();
    let mut tallies: HashMap<Address, (u64, u64)> = HashMap::new();
    for (i, slot) in committee.slots.iter().enumerate() {
        if slot.effective_stake.is_none() {
            continue;
        }
        let entry = tallies.entry(slot.address).or_insert_with(|| {
            order.push(slot.address);
            (0, 0)
        });
        entry.1 += 1;
        if mask.is_set(i) {
            entry.0 += 1;
        }
    }

    for address in order {
        let (signed, to_sign) = tallies[&address];
        let mut wrapper = state.validator_wrapper(&address)?;
        wrapper.counters.blocks_signed += signed;
        wrapper.counters.blocks_to_sign += to_sign;
        state.update_validator_wrapper(&address, wrapper)?;
    }
    Ok(())
}

/// Splits the configured block reward among the signers.
fn pay_block_reward(
    chain: &dyn ChainReader,
    state: &mut dyn StateDB,
    committee: &meridian_shard::Committee,
    mask: &SignerMask<'_>,
    staking: bool,
) -> Result<RewardReport> {
    let block_reward = chain.config().block_reward_amount();
    let signer_indices = mask.signer_indices();
    if block_reward == 0 || signer_indices.is_empty() {
        return Ok(RewardReport::default());
    }

    let roster = Roster::compute(committee, staking)?;
    let signed_power: u64 = roster.share_by_slots(&signer_indices);
    if signed_power == 0 {
        return Ok(RewardReport::default());
    }

    // Per-address accumulation in slot order keeps the payout list stable.
    let mut order: Vec<Address> = Vec::new();
    let mut amounts: HashMap<Address, u128> = HashMap::new();
    for share in &roster.shares {
        if !signer_indices.contains(&share.slot_index) {
            continue;
        }
        let amount = block_reward.saturating_mul(share.share_bps as u128) / signed_power as u128;
        if amount == 0 {
            continue;
        }
        if !amounts.contains_key(&share.address) {
            order.push(share.address);
        }
        *amounts.entry(share.address).or_default() += amount;
    }

    let mut payouts = Vec::with_capacity(order.len());
    for address in order {
        let amount = amounts[&address];
        state.add_balance(&address, amount);
        payouts.push(Payout { address, amount });
    }
    Ok(RewardReport { payouts })
}
