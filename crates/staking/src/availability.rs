//! EPoS availability: eligibility recomputation from signing records.
//!
//! At every committee-selection block the outgoing committee's staked
//! validators have their eligibility recomputed from the signing counters
//! accumulated over the closing epoch. The threshold is two-thirds of
//! expected blocks; validators below it drop to `Inactive` and must
//! reactivate explicitly. This must run against the counters as they stood
//! when the new shard state was proposed, before reward accumulation
//! advances them.

use crate::{EposStatus, Result, SigningCounters, StateDB};
use meridian_types::Address;
use tracing::debug;

/// Computes the eligibility implied by a signing record.
///
/// Returns `None` when the validator had no signing duty, in which case the
/// stored status stands.
pub fn status_from_counters(counters: &SigningCounters) -> Option<EposStatus> {
    if counters.blocks_to_sign == 0 {
        return None;
    }
    if counters.blocks_signed * 3 >= counters.blocks_to_sign * 2 {
        Some(EposStatus::Active)
    } else {
        Some(EposStatus::Inactive)
    }
}

/// Recomputes and stores a validator's EPoS status.
///
/// A `Banned` validator is never reinstated here; bans are permanent until
/// governance intervenes.
pub fn compute_and_mutate_epos_status(
    state: &mut dyn StateDB,
    address: &Address,
) -> Result<()> {
    let mut wrapper = state.validator_wrapper(address)?;
    if wrapper.status == EposStatus::Banned {
        return Ok(());
    }
    let Some(new_status) = status_from_counters(&wrapper.counters) else {
        return Ok(());
    };
    if new_status != wrapper.status {
        debug!(
            validator = %address,
            signed = wrapper.counters.blocks_signed,
            to_sign = wrapper.counters.blocks_to_sign,
            ?new_status,
            "EPoS status changed"
        );
    }
    wrapper.status = new_status;
    state.update_validator_wrapper(address, wrapper)
}
