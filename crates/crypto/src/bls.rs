//! # BLS12-381 Signatures for Commit Verification
//!
//! BLS (Boneh-Lynn-Shacham) signatures on the BLS12-381 curve, used for the
//! aggregated commit signatures that seal Meridian blocks. The key property is
//! **signature aggregation**: a committee's individual commit signatures
//! combine into a single 96-byte signature that verifies against the
//! aggregated public key of the participating signers.
//!
//! ## Key Types
//!
//! - [`BlsSecretKey`] - secret key for signing (32-byte scalar)
//! - [`BlsPublicKey`] - public key (48-byte G1 point)
//! - [`BlsSignature`] - signature (96-byte G2 point)
//! - [`SerializedPublicKey`] / [`SerializedSignature`] - fixed-width wire forms
//! - [`SignerMask`] - a participation bitmap resolved against a committee's
//!   ordered public-key list
//!
//! Encodings are validated for canonical form on decode to prevent
//! malleability.

use crate::{CryptoError, Result};
use blst::min_pk::{AggregatePublicKey, PublicKey, SecretKey, Signature};
use blst::BLST_ERROR;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Domain separation tag for commit signatures.
const DST_COMMIT: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_MERIDIAN_COMMIT_";

/// Size of a compressed public key in bytes (G1 point).
pub const PUBLIC_KEY_BYTES: usize = 48;

/// Size of a compressed signature in bytes (G2 point).
pub const SIGNATURE_BYTES: usize = 96;

/// Maximum number of validator slots a participation bitmap may address.
pub const MAX_SIGNERS: usize = 512;

/// Maximum participation bitmap length in bytes (512 slots, one bit each).
pub const MAX_BITMAP_BYTES: usize = MAX_SIGNERS / 8;

/// Fixed-width wire form of a BLS public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerializedPublicKey(pub [u8; PUBLIC_KEY_BYTES]);

impl SerializedPublicKey {
    /// Returns the raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decodes into a curve point, validating canonical encoding.
    pub fn decode(&self) -> Result<BlsPublicKey> {
        BlsPublicKey::from_bytes(&self.0)
    }
}

impl Default for SerializedPublicKey {
    fn default() -> Self {
        Self([0u8; PUBLIC_KEY_BYTES])
    }
}

impl fmt::Debug for SerializedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerializedPublicKey(0x{})", hex::encode(self.0))
    }
}

impl Serialize for SerializedPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for SerializedPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)?;
        if bytes.len() != PUBLIC_KEY_BYTES {
            return Err(serde::de::Error::custom(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_BYTES,
                bytes.len()
            )));
        }
        let mut arr = [0u8; PUBLIC_KEY_BYTES];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

/// Fixed-width wire form of a BLS signature, as carried in block headers.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SerializedSignature(pub [u8; SIGNATURE_BYTES]);

impl SerializedSignature {
    /// Returns the raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Creates a serialized signature from a slice.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != SIGNATURE_BYTES {
            return Err(CryptoError::InvalidLength {
                expected: SIGNATURE_BYTES,
                actual: slice.len(),
            });
        }
        let mut arr = [0u8; SIGNATURE_BYTES];
        arr.copy_from_slice(slice);
        Ok(Self(arr))
    }

    /// Decodes into a curve point, validating canonical encoding.
    pub fn decode(&self) -> Result<BlsSignature> {
        BlsSignature::from_bytes(&self.0)
    }
}

impl Default for SerializedSignature {
    fn default() -> Self {
        Self([0u8; SIGNATURE_BYTES])
    }
}

impl fmt::Debug for SerializedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerializedSignature(0x{})", hex::encode(self.0))
    }
}

impl Serialize for SerializedSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for SerializedSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)?;
        Self::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}

/// BLS secret key (32-byte scalar).
pub struct BlsSecretKey {
    inner: SecretKey,
}

impl BlsSecretKey {
    /// Generates a random secret key using the OS RNG.
    pub fn random() -> Self {
        let mut ikm = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut ikm);
        let sk = SecretKey::key_gen(&ikm, &[]).expect("32-byte IKM is always sufficient");
        Self { inner: sk }
    }

    /// Derives a secret key from input keying material (at least 32 bytes).
    pub fn from_seed(ikm: &[u8]) -> Result<Self> {
        if ikm.len() < 32 {
            return Err(CryptoError::InvalidLength {
                expected: 32,
                actual: ikm.len(),
            });
        }
        let sk = SecretKey::key_gen(ikm, &[])
            .map_err(|e| CryptoError::InvalidSecretKey(format!("{:?}", e)))?;
        Ok(Self { inner: sk })
    }

    /// Derives the public key.
    pub fn public_key(&self) -> BlsPublicKey {
        BlsPublicKey {
            inner: self.inner.sk_to_pk(),
        }
    }

    /// Signs a commit payload.
    pub fn sign(&self, message: &[u8]) -> BlsSignature {
        BlsSignature {
            inner: self.inner.sign(message, DST_COMMIT, &[]),
        }
    }
}

impl fmt::Debug for BlsSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlsSecretKey")
            .field("public_key", &self.public_key().to_hex())
            .finish()
    }
}

/// BLS public key (48-byte compressed G1 point).
///
/// Implements `Ord` over the compressed bytes for deterministic ordering.
#[derive(Clone)]
pub struct BlsPublicKey {
    inner: PublicKey,
}

impl BlsPublicKey {
    /// Creates a public key from compressed bytes, validating that the bytes
    /// are a valid point in canonical form.
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_BYTES]) -> Result<Self> {
        let pk = PublicKey::from_bytes(bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(format!("{:?}", e)))?;
        if pk.to_bytes() != *bytes {
            return Err(CryptoError::InvalidPublicKey(
                "non-canonical public key encoding".to_string(),
            ));
        }
        Ok(Self { inner: pk })
    }

    /// Returns the compressed public key bytes.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_BYTES] {
        self.inner.to_bytes()
    }

    /// Returns the fixed-width wire form.
    pub fn serialized(&self) -> SerializedPublicKey {
        SerializedPublicKey(self.to_bytes())
    }

    /// Returns the hex-encoded public key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Aggregates multiple public keys into one.
    pub fn aggregate(pubkeys: &[&BlsPublicKey]) -> Result<Self> {
        if pubkeys.is_empty() {
            return Err(CryptoError::AggregationFailed(
                "cannot aggregate empty list".to_string(),
            ));
        }
        let pks: Vec<&PublicKey> = pubkeys.iter().map(|pk| &pk.inner).collect();
        let agg = AggregatePublicKey::aggregate(&pks, false)
            .map_err(|e| CryptoError::AggregationFailed(format!("{:?}", e)))?;
        Ok(Self {
            inner: agg.to_public_key(),
        })
    }
}

impl PartialEq for BlsPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for BlsPublicKey {}

impl PartialOrd for BlsPublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BlsPublicKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl std::hash::Hash for BlsPublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl fmt::Debug for BlsPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlsPublicKey")
            .field("bytes", &self.to_hex())
            .finish()
    }
}

/// BLS signature (96-byte compressed G2 point).
#[derive(Clone)]
pub struct BlsSignature {
    inner: Signature,
}

impl BlsSignature {
    /// Creates a signature from compressed bytes, validating canonical
    /// encoding to prevent malleability.
    pub fn from_bytes(bytes: &[u8; SIGNATURE_BYTES]) -> Result<Self> {
        let sig = Signature::from_bytes(bytes)
            .map_err(|e| CryptoError::InvalidSignature(format!("{:?}", e)))?;
        if sig.to_bytes() != *bytes {
            return Err(CryptoError::InvalidSignature(
                "non-canonical signature encoding".to_string(),
            ));
        }
        Ok(Self { inner: sig })
    }

    /// Returns the compressed signature bytes.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_BYTES] {
        self.inner.to_bytes()
    }

    /// Returns the fixed-width wire form.
    pub fn serialized(&self) -> SerializedSignature {
        SerializedSignature(self.to_bytes())
    }

    /// Verifies the signature over a message against a single (possibly
    /// aggregated) public key.
    pub fn verify(&self, message: &[u8], public_key: &BlsPublicKey) -> bool {
        let result = self
            .inner
            .verify(true, message, DST_COMMIT, &[], &public_key.inner, true);
        result == BLST_ERROR::BLST_SUCCESS
    }

    /// Aggregates multiple signatures over the same message into one.
    pub fn aggregate(signatures: &[&BlsSignature]) -> Result<Self> {
        if signatures.is_empty() {
            return Err(CryptoError::AggregationFailed(
                "cannot aggregate empty list".to_string(),
            ));
        }
        let sigs: Vec<&Signature> = signatures.iter().map(|s| &s.inner).collect();
        let agg = blst::min_pk::AggregateSignature::aggregate(&sigs, false)
            .map_err(|e| CryptoError::AggregationFailed(format!("{:?}", e)))?;
        Ok(Self {
            inner: agg.to_signature(),
        })
    }
}

impl PartialEq for BlsSignature {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for BlsSignature {}

impl fmt::Debug for BlsSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlsSignature")
            .field("bytes", &hex::encode(self.to_bytes()))
            .finish()
    }
}

/// A participation bitmap resolved against a committee's ordered public-key
/// list.
///
/// Bit `i` of the bitmap corresponds to `keys[i]`; the bitmap length must
/// exactly cover the key count and may not exceed [`MAX_BITMAP_BYTES`].
pub struct SignerMask<'a> {
    keys: &'a [BlsPublicKey],
    bitmap: Vec<u8>,
}

impl<'a> SignerMask<'a> {
    /// Resolves a raw bitmap against an ordered public-key list.
    ///
    /// Rejects bitmaps whose length does not equal `ceil(len(keys) / 8)`,
    /// bitmaps longer than [`MAX_BITMAP_BYTES`], and bitmaps with bits set
    /// beyond the key count.
    pub fn from_bitmap(keys: &'a [BlsPublicKey], bitmap: &[u8]) -> Result<Self> {
        if bitmap.len() > MAX_BITMAP_BYTES {
            return Err(CryptoError::InvalidBitmap(format!(
                "bitmap of {} bytes exceeds the {} byte maximum",
                bitmap.len(),
                MAX_BITMAP_BYTES
            )));
        }
        let expected = (keys.len() + 7) / 8;
        if bitmap.len() != expected {
            return Err(CryptoError::InvalidBitmap(format!(
                "bitmap of {} bytes does not cover {} keys (want {} bytes)",
                bitmap.len(),
                keys.len(),
                expected
            )));
        }
        // No stray bits past the last key.
        for i in keys.len()..bitmap.len() * 8 {
            if bitmap[i / 8] & (1 << (i % 8)) != 0 {
                return Err(CryptoError::InvalidBitmap(format!(
                    "bit {} set beyond committee of {} keys",
                    i,
                    keys.len()
                )));
            }
        }
        Ok(Self {
            keys,
            bitmap: bitmap.to_vec(),
        })
    }

    /// Checks whether the bit for slot `index` is set.
    pub fn is_set(&self, index: usize) -> bool {
        index < self.keys.len() && self.bitmap[index / 8] & (1 << (index % 8)) != 0
    }

    /// Returns the number of participating signers.
    pub fn count_enabled(&self) -> usize {
        self.bitmap.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Returns the slot indices of all participating signers, in committee
    /// order.
    pub fn signer_indices(&self) -> Vec<usize> {
        (0..self.keys.len()).filter(|&i| self.is_set(i)).collect()
    }

    /// Returns the total number of slots the mask covers.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Checks whether the mask covers no slots.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the raw bitmap bytes.
    pub fn bitmap(&self) -> &[u8] {
        &self.bitmap
    }

    /// Aggregates the public keys of all participating signers.
    pub fn aggregate_public(&self) -> Result<BlsPublicKey> {
        let signers: Vec<&BlsPublicKey> = (0..self.keys.len())
            .filter(|&i| self.is_set(i))
            .map(|i| &self.keys[i])
            .collect();
        BlsPublicKey::aggregate(&signers)
    }
}

impl fmt::Debug for SignerMask<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerMask")
            .field("slots", &self.keys.len())
            .field("enabled", &self.count_enabled())
            .finish()
    }
}

/// Decodes a serialized aggregate signature and participation bitmap against
/// a committee's ordered public-key list.
///
/// This is the entry point used by commit verification: decode failures on
/// either part are fatal to the block carrying them.
pub fn decode_sig_bitmap<'a>(
    sig: &SerializedSignature,
    bitmap: &[u8],
    keys: &'a [BlsPublicKey],
) -> Result<(BlsSignature, SignerMask<'a>)> {
    let signature = sig.decode()?;
    let mask = SignerMask::from_bitmap(keys, bitmap)?;
    Ok((signature, mask))
}
