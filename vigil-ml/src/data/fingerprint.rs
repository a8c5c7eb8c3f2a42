//! SHA-256 fingerprints of dataset files, recorded in stage artifacts.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Hex SHA-256 of a file's contents.
pub fn hash_file(path: &Path) -> Result<String> {
    let content = std::fs::read(path)?;
    Ok(hash_bytes(&content))
}

/// Hex SHA-256 of arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
