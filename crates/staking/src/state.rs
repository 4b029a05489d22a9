//! The state abstraction mutated during finalization.

use crate::{Result, ValidatorWrapper};
use meridian_types::{Address, H256};

/// World-state access as the finalizer sees it: account balances and
/// validator wrappers.
///
/// Implementations are single-writer within a finalize call; handing the
/// same state to two concurrent finalizers is a caller bug. Reads return
/// owned copies; mutations go through the explicit update methods so that
/// an implementation can track dirtiness for root recomputation.
pub trait StateDB {
    /// Returns a copy of a validator's mutable record.
    fn validator_wrapper(&self, address: &Address) -> Result<ValidatorWrapper>;

    /// Writes back a (possibly modified) validator record.
    fn update_validator_wrapper(
        &mut self,
        address: &Address,
        wrapper: ValidatorWrapper,
    ) -> Result<()>;

    /// Credits an account balance.
    fn add_balance(&mut self, address: &Address, amount: u128);

    /// Computes the current state root.
    ///
    /// `is_s3` selects which pre-image and empty-hash conventions the
    /// backing trie uses.
    fn intermediate_root(&mut self, is_s3: bool) -> H256;
}
