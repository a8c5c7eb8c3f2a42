//! Artifact persistence: atomic file writes and JSON/YAML loading.
//!
//! Every stage output goes through [`atomic_write`]; readers see either the
//! previous file or the complete new one.

use crate::error::{PipelineError, Result};
use std::path::{Path, PathBuf};

/// Atomically write raw bytes to a file.
///
/// Writes to a `<name>.tmp` sibling, then renames onto the target path,
/// replacing any previous file. Creates parent directories if they don't exist.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_sibling(path);
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Atomically write pretty-printed JSON.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    atomic_write(path, json.as_bytes())
}

/// Atomically write YAML.
pub fn atomic_write_yaml<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(data)?;
    atomic_write(path, yaml.as_bytes())
}

/// Load and deserialize a JSON file that must exist.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Load and deserialize a YAML file that must exist.
pub fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::config(format!("cannot read {}: {e}", path.display())))?;
    Ok(serde_yaml::from_str(&data)?)
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
