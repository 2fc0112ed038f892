//! Content hashing utilities for cache keys.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::planner::logical::Expr;

/// Compute SHA256 hash of a serializable value.
///
/// The value is serialized to JSON before hashing, ensuring deterministic output.
/// Returns a 64-character lowercase hexadecimal string.
///
/// # Errors
/// Returns an error if the value cannot be serialized to JSON.
pub fn compute_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest identifying a predicate inside a cache key.
pub fn predicate_digest(predicate: &Expr) -> String {
    compute_hash(predicate).unwrap_or_else(|_| {
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", predicate).as_bytes());
        format!("{:x}", hasher.finalize())
    })
}
