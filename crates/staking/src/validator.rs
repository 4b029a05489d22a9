//! Validator wrappers, delegations and undelegation maturity.

use meridian_types::Address;
use serde::{Deserialize, Serialize};

/// Undelegation lock period in epochs.
pub const LOCK_PERIOD_IN_EPOCHS: u64 = 7;

/// Shortened lock period once the QuickUnlock fork is active.
pub const LOCK_PERIOD_IN_EPOCHS_V2: u64 = 2;

/// EPoS eligibility of a validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EposStatus {
    /// Eligible for committee election
    Active,
    /// Signed too few blocks; excluded until reactivated
    Inactive,
    /// Permanently excluded after a double-sign slash
    Banned,
}

/// A validator's signing record for the current epoch.
///
/// `blocks_to_sign` counts the blocks the validator's committee produced
/// while it held a slot; `blocks_signed` counts how many of those carried
/// its signature in the commit bitmap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningCounters {
    /// Blocks whose commit carried this validator's signature
    pub blocks_signed: u64,
    /// Blocks this validator was expected to sign
    pub blocks_to_sign: u64,
}

/// A pending withdrawal, unlocking after the lock period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Undelegation {
    /// Amount awaiting release
    pub amount: u128,
    /// Epoch in which the undelegation was requested
    pub epoch: u64,
}

/// A delegator's position with one validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// The delegating account
    pub delegator_address: Address,
    /// Actively delegated amount
    pub amount: u128,
    /// Pending withdrawals, ordered by request epoch ascending
    pub undelegations: Vec<Undelegation>,
}

impl Delegation {
    /// Creates a delegation with no pending withdrawals.
    pub fn new(delegator_address: Address, amount: u128) -> Self {
        Self {
            delegator_address,
            amount,
            undelegations: Vec::new(),
        }
    }

    /// Removes and totals every undelegation withdrawable at
    /// `current_epoch`.
    ///
    /// An entry is withdrawable once the lock period has elapsed since it
    /// was requested, or - unless `no_early_unlock` - once the validator has
    /// been out of the committee for a full lock period. Entries are ordered
    /// by request epoch, so scanning stops at the first entry still locked.
    pub fn remove_unlocked_undelegations(
        &mut self,
        current_epoch: u64,
        last_epoch_in_committee: u64,
        lock_period: u64,
        no_early_unlock: bool,
    ) -> u128 {
        let mut total_withdraw = 0u128;
        let mut count = 0usize;
        for entry in &self.undelegations {
            let lock_elapsed = current_epoch.saturating_sub(entry.epoch) >= lock_period;
            let out_of_committee = !no_early_unlock
                && current_epoch.saturating_sub(last_epoch_in_committee) >= lock_period;
            if lock_elapsed || out_of_committee {
                total_withdraw += entry.amount;
                count += 1;
            } else {
                break;
            }
        }
        self.undelegations.drain(..count);
        total_withdraw
    }
}

/// The mutable per-validator record held in state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorWrapper {
    /// The validator's address
    pub address: Address,
    /// Epoch of the newest shard state that includes this validator
    pub last_epoch_in_committee: u64,
    /// Current EPoS eligibility
    pub status: EposStatus,
    /// Signing record feeding the eligibility computation
    pub counters: SigningCounters,
    /// All delegations to this validator, self-delegation first
    pub delegations: Vec<Delegation>,
}

impl ValidatorWrapper {
    /// Creates a wrapper with an initial self-delegation.
    pub fn new(address: Address, self_delegation: u128) -> Self {
        Self {
            address,
            last_epoch_in_committee: 0,
            status: EposStatus::Active,
            counters: SigningCounters::default(),
            delegations: vec![Delegation::new(address, self_delegation)],
        }
    }

    /// Total amount actively delegated to this validator.
    pub fn total_delegation(&self) -> u128 {
        self.delegations.iter().map(|d| d.amount).sum()
    }
}
