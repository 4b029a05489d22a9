//! # Meridian Crypto
//!
//! Cryptographic primitives for the Meridian blockchain.
//!
//! This crate provides:
//! - **Keccak256 hashing** - canonical digest used across the chain
//! - **BLS12-381 signatures** - aggregatable commit signatures for consensus
//! - **Signer masks** - participation bitmaps decoded against a committee's
//!   ordered public-key list
//!
//! ## Example
//!
//! ```rust
//! use meridian_crypto::{keccak256, bls::BlsSecretKey};
//!
//! let digest = keccak256(b"hello world");
//! assert_eq!(digest.len(), 32);
//!
//! let sk = BlsSecretKey::from_seed(&[7u8; 32]).unwrap();
//! let sig = sk.sign(&digest);
//! assert!(sig.verify(&digest, &sk.public_key()));
//! ```

pub mod bls;
pub mod hash;

pub use bls::{
    decode_sig_bitmap, BlsPublicKey, BlsSecretKey, BlsSignature, SerializedPublicKey,
    SerializedSignature, SignerMask, MAX_BITMAP_BYTES, MAX_SIGNERS, PUBLIC_KEY_BYTES,
    SIGNATURE_BYTES,
};
pub use hash::keccak256;

/// Common type alias for a 32-byte digest
pub type Digest = [u8; 32];

/// Error types for cryptographic operations
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Invalid secret key bytes
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    /// Invalid public key bytes
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Invalid signature bytes
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Malformed participation bitmap
    #[error("invalid bitmap: {0}")]
    InvalidBitmap(String),

    /// Public key aggregation failed
    #[error("aggregation failed: {0}")]
    AggregationFailed(String),

    /// Invalid input length
    #[error("invalid input length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Hex decoding error
    #[error("hex decoding error: {0}")]
    HexError(String),
}

impl From<hex::FromHexError> for CryptoError {
    fn from(e: hex::FromHexError) -> Self {
        CryptoError::HexError(e.to_string())
    }
}

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;
