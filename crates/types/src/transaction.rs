//! Transactions, receipts and cross-shard receipts.
//!
//! The finalizer assembles sealed blocks from already-executed transactions;
//! execution itself happens elsewhere. These types therefore carry only the
//! data the block body and cross-shard plumbing need.

use crate::{Address, H256};
use rlp::RlpStream;
use serde::{Deserialize, Serialize};

/// A plain value-transfer transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender nonce
    pub nonce: u64,
    /// Sender address
    pub from: Address,
    /// Recipient address
    pub to: Address,
    /// Amount transferred, in the smallest unit
    pub amount: u128,
    /// Gas limit
    pub gas_limit: u64,
    /// Shard the transaction executes on
    pub shard_id: u32,
    /// Destination shard for cross-shard transfers (equals `shard_id` otherwise)
    pub to_shard_id: u32,
}

impl Transaction {
    /// Computes the transaction hash (Keccak256 of the RLP encoding).
    pub fn hash(&self) -> H256 {
        let mut stream = RlpStream::new_list(7);
        stream.append(&self.nonce);
        stream.append(&self.from);
        stream.append(&self.to);
        stream.append(&self.amount);
        stream.append(&self.gas_limit);
        stream.append(&self.shard_id);
        stream.append(&self.to_shard_id);
        H256::keccak256(&stream.out())
    }

    /// Checks whether this transaction leaves its source shard.
    pub fn is_cross_shard(&self) -> bool {
        self.shard_id != self.to_shard_id
    }
}

/// Execution receipt for a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Hash of the transaction this receipt belongs to
    pub tx_hash: H256,
    /// Whether execution succeeded
    pub success: bool,
    /// Gas consumed
    pub gas_used: u64,
}

/// Outgoing cross-shard receipt: a transfer leaving this shard, to be
/// credited on the destination shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CxReceipt {
    /// Hash of the originating transaction
    pub tx_hash: H256,
    /// Sender on the source shard
    pub from: Address,
    /// Recipient on the destination shard
    pub to: Address,
    /// Source shard
    pub shard_id: u32,
    /// Destination shard
    pub to_shard_id: u32,
    /// Amount transferred
    pub amount: u128,
}

/// Incoming cross-shard receipts together with the proof binding them to
/// their source-shard block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CxReceiptsProof {
    /// The receipts being delivered
    pub receipts: Vec<CxReceipt>,
    /// Hash of the source-shard block that emitted them
    pub block_hash: H256,
    /// Merkle root committing to the receipt set
    pub receipts_root: H256,
}

/// The staking operation a staking transaction performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingDirective {
    /// Register a new validator
    CreateValidator,
    /// Update an existing validator's details
    EditValidator,
    /// Delegate stake to a validator
    Delegate,
    /// Request withdrawal of delegated stake
    Undelegate,
    /// Collect accumulated delegation rewards
    CollectRewards,
}

/// A staking transaction, only valid on the beacon shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingTransaction {
    /// Sender nonce
    pub nonce: u64,
    /// Sender address
    pub from: Address,
    /// The validator the operation targets
    pub validator: Address,
    /// The operation performed
    pub directive: StakingDirective,
    /// Amount attached to the operation (zero where not applicable)
    pub amount: u128,
}

impl StakingTransaction {
    /// Computes the transaction hash (Keccak256 of the RLP encoding).
    pub fn hash(&self) -> H256 {
        let mut stream = RlpStream::new_list(5);
        stream.append(&self.nonce);
        stream.append(&self.from);
        stream.append(&self.validator);
        stream.append(&(self.directive as u8));
        stream.append(&self.amount);
        H256::keccak256(&stream.out())
    }
}
