//! The single serializer for configuration documents
//!
//! Every document becomes text here and nowhere else. Bodies are typed node
//! trees; serializing them through serde keeps the output well-formed by
//! construction.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{DocumentBody, DocumentError};

/// Serialize a document body to its YAML raw form
pub fn to_yaml(body: &DocumentBody) -> Result<String, DocumentError> {
    serde_yaml::to_string(body).map_err(DocumentError::Serialize)
}

/// Hex SHA-256 of the canonical JSON form of `value`, truncated to 16 chars
///
/// Canonical means serde_json's deterministic output: struct fields in
/// declaration order, map keys sorted. Identical semantic content always
/// hashes identically, so re-synthesis yields the same id.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String, DocumentError> {
    let canonical = serde_json::to_vec(value).map_err(DocumentError::Canonicalize)?;
    let digest = Sha256::digest(&canonical);
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    Ok(hex[..16].to_string())
}
