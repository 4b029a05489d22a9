//! Abstractions the engine consumes: chain access and committee selection.

use crate::Result;
use meridian_config::ChainConfig;
use meridian_shard::schedule::ShardSchedule;
use meridian_shard::ShardState;
use meridian_types::{Address, Header, H256};

/// Read-only access to a shard chain.
///
/// Implementations must be safe for concurrent readers; the engine never
/// writes through this trait.
pub trait ChainReader: Send + Sync {
    /// The chain configuration, including the fork-epoch schedule.
    fn config(&self) -> &ChainConfig;

    /// The shard this chain serves.
    fn shard_id(&self) -> u32;

    /// The header at the current tip.
    fn current_header(&self) -> Header;

    /// Looks up a header by hash and number.
    fn get_header(&self, hash: &H256, number: u64) -> Option<Header>;

    /// Reads the stored shard state for an epoch.
    fn read_shard_state(&self, epoch: u64) -> Result<ShardState>;

    /// Reads the full validator list known to this chain.
    fn read_validator_list(&self) -> Result<Vec<Address>>;

    /// Computes the super-committee that takes effect in the epoch after
    /// `header`, consulting the beacon chain for staking data.
    fn next_epoch_committee(
        &self,
        beacon: &dyn ChainReader,
        header: &Header,
    ) -> Result<ShardState>;
}

/// Deterministic recomputation of a super-committee for an epoch.
///
/// Injected into the engine rather than referenced as a global so tests can
/// substitute a stub and observe when recomputation is chosen over stored
/// state.
pub trait CommitteeSelector: Send + Sync {
    /// Recomputes the super-committee for `epoch` from chain inputs.
    fn compute(&self, epoch: u64, chain: &dyn ChainReader) -> Result<ShardState>;
}

/// The default selector: pre-staking committees come from the fixed genesis
/// shard schedule.
#[derive(Debug, Clone)]
pub struct GenesisSelector {
    schedule: ShardSchedule,
}

impl GenesisSelector {
    /// Creates a selector over a genesis schedule.
    pub fn new(schedule: ShardSchedule) -> Self {
        Self { schedule }
    }
}

impl CommitteeSelector for GenesisSelector {
    fn compute(&self, epoch: u64, _chain: &dyn ChainReader) -> Result<ShardState> {
        Ok(self.schedule.compute(epoch)?)
    }
}
