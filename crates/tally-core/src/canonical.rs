//! Canonical JSON encoding and SHA-256 digests
//!
//! Every hash in the system (block hashes, state roots, payload digests) is
//! SHA-256 over a canonical JSON encoding: objects carry their keys in
//! lexicographic order and timestamps render as RFC 3339 UTC strings.
//! Encoding goes through [`serde_json::Value`], whose map type keeps keys
//! sorted, so structurally equal values always produce identical bytes
//! regardless of field declaration or insertion order.

use serde::Serialize;
use sha2::{Digest as _, Sha256};

use crate::error::CodecError;
use crate::types::Digest;

/// Encode a value into its canonical JSON byte form.
pub fn to_canonical_vec<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let normalized = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&normalized)?)
}

/// SHA-256 digest of the canonical JSON encoding of a value.
pub fn digest_json<T: Serialize>(value: &T) -> Result<Digest, CodecError> {
    Ok(digest_bytes(&to_canonical_vec(value)?))
}

/// SHA-256 digest of raw bytes.
pub fn digest_bytes(data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    Digest::from_bytes(out)
}
