//! # Meridian Types
//!
//! Core type definitions for the Meridian sharded blockchain.
//!
//! This crate provides the fundamental types used throughout Meridian:
//! - [`Address`] - 20-byte account addresses
//! - [`H256`] - 32-byte hashes with Keccak256 support
//! - [`Header`] - Block headers carrying the parent commit and shard state
//! - [`Block`] - A sealed block with transactions and cross-shard receipts
//!
//! ## Example
//!
//! ```rust
//! use meridian_types::{Address, H256};
//!
//! let addr: Address = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb1".parse().unwrap();
//! let hash = H256::keccak256(b"hello world");
//! assert_ne!(hash, H256::NIL);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod address;
pub mod block;
pub mod hash;
pub mod header;
pub mod transaction;

pub use address::Address;
pub use block::Block;
pub use hash::H256;
pub use header::Header;
pub use transaction::{
    CxReceipt, CxReceiptsProof, Receipt, StakingDirective, StakingTransaction, Transaction,
};

/// Result type alias for Meridian type operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when working with Meridian types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid hex string
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Invalid length for a fixed-size type
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Invalid address format
    #[error("invalid address format: {0}")]
    InvalidAddress(String),

    /// Invalid hash format
    #[error("invalid hash format: {0}")]
    InvalidHash(String),

    /// RLP decoding error
    #[error("RLP decode error: {0}")]
    RlpDecode(#[from] rlp::DecoderError),
}
