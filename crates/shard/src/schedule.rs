//! Genesis shard schedule.
//!
//! Before the staking era, committees do not change: every shard is served
//! by the validator set fixed at genesis. A transaction shard does not
//! retain other shards' pre-staking committees, so cross-shard verification
//! recomputes them from this schedule instead of reading stored state.

use crate::{Committee, Result, ShardState};
use serde::{Deserialize, Serialize};

/// The fixed genesis assignment of validator slots to shards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSchedule {
    /// Genesis committees, one per shard
    pub shards: Vec<Committee>,
}

impl ShardSchedule {
    /// Creates a schedule from genesis committees.
    pub fn new(shards: Vec<Committee>) -> Self {
        Self { shards }
    }

    /// Returns the number of shards the schedule covers.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Deterministically recomputes the super-committee for a pre-staking
    /// epoch.
    ///
    /// Pre-staking committees are the genesis committees; only the stamped
    /// epoch differs.
    pub fn compute(&self, epoch: u64) -> Result<ShardState> {
        Ok(ShardState {
            epoch,
            shards: self.shards.clone(),
        })
    }
}
