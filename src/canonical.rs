//! Canonical serialization for deterministic hashing.
//!
//! This module provides functions to serialize data in a canonical, deterministic format
//! suitable for content identity and cache keys.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: Struct fields serialize in declaration order
//! - Stable Vec order: Vectors serialize in index order
//! - No HashMap allowed: Use BTreeMap for maps in hashed data
//! - Stable float format: quantize floats before hashing (see [`quantize`])

use serde::Serialize;
use sha2::{Digest, Sha256};
use xxhash_rust::xxh64::xxh64;

/// Quantization factor for float normalization.
const FLOAT_QUANTIZATION_FACTOR: f64 = 1_000_000_000.0;

/// Serialize a value to canonical JSON bytes for hashing.
///
/// # Panics
///
/// Only if `T`'s `Serialize` implementation fails, which cannot happen for the
/// string-keyed maps, vectors and scalars hashed in this crate.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("Canonical serialization failed")
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    let bytes = to_canonical_bytes(value);
    xxh64(&bytes, 0)
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

/// Compute the SHA-256 content hash of a value's canonical bytes.
///
/// Used where identity must be collision resistant (graph ids act as cache
/// keys for derived artifacts). Returned as 64 lowercase hex characters.
pub fn content_hash_hex<T: Serialize>(value: &T) -> String {
    let mut hasher = Sha256::new();
    hasher.update(to_canonical_bytes(value));
    hex::encode(hasher.finalize())
}

/// Quantize a float to an i64 for deterministic hashing.
pub fn quantize(value: f64) -> i64 {
    (value * FLOAT_QUANTIZATION_FACTOR).round() as i64
}
