//! Sealed block assembled by the finalizer.

use crate::{
    CxReceipt, CxReceiptsProof, H256, Header, Receipt, StakingTransaction, Transaction,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A complete block: the finalized header plus everything executed in it.
///
/// Blocks are assembled exactly once, at the end of finalization, after the
/// header's view id and state root have been stamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// The sealed header
    pub header: Header,
    /// Plain transactions executed in this block
    pub transactions: Vec<Transaction>,
    /// Receipts for the executed transactions
    pub receipts: Vec<Receipt>,
    /// Cross-shard transfers leaving this shard
    pub outgoing_receipts: Vec<CxReceipt>,
    /// Cross-shard transfers arriving from other shards, with proofs
    pub incoming_receipts: Vec<CxReceiptsProof>,
    /// Staking transactions (beacon shard only)
    pub staking_transactions: Vec<StakingTransaction>,
}

impl Block {
    /// Assembles a block from its finalized parts.
    pub fn new(
        header: Header,
        transactions: Vec<Transaction>,
        receipts: Vec<Receipt>,
        outgoing_receipts: Vec<CxReceipt>,
        incoming_receipts: Vec<CxReceiptsProof>,
        staking_transactions: Vec<StakingTransaction>,
    ) -> Self {
        Self {
            header,
            transactions,
            receipts,
            outgoing_receipts,
            incoming_receipts,
            staking_transactions,
        }
    }

    /// Returns the block hash (hash of the header).
    pub fn hash(&self) -> H256 {
        self.header.hash()
    }

    /// Returns the block number.
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Returns the epoch the block belongs to.
    pub fn epoch(&self) -> u64 {
        self.header.epoch
    }

    /// Returns the shard the block belongs to.
    pub fn shard_id(&self) -> u32 {
        self.header.shard_id
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block #{} (shard: {}, {} txs, {} staking txs)",
            self.number(),
            self.shard_id(),
            self.transactions.len(),
            self.staking_transactions.len()
        )
    }
}
