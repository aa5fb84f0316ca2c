//! Content hashing for attestations and outcome proofs.
//!
//! Hashes are SHA-256 over the compact JSON encoding of a value, hex encoded.
//! Callers hash a dedicated projection struct so field order is fixed by the
//! struct declaration rather than by map iteration.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Compute the SHA-256 content hash of a serializable value.
pub fn content_hash<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(hash_bytes(&bytes))
}

/// Compute the SHA-256 hash of raw bytes.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Recompute a value's hash and compare with an expected one.
pub fn verify_hash<T: Serialize + ?Sized>(value: &T, expected: &str) -> Result<bool> {
    Ok(content_hash(value)?.eq_ignore_ascii_case(expected))
}
