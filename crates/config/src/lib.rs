//! Configuration loading for Drasta
//!
//! Provides utilities for locating and loading files from the Drasta
//! config (~/.config/drasta/) and data (~/.local/share/drasta/) directories.
//!
//! Call [`init`] at application startup to bootstrap the directories.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Application directory name used under the platform config/data roots
const APP_DIR: &str = "drasta";

/// Initialize the Drasta config and data directories.
///
/// Creates both directories if they don't exist and returns the data
/// directory, which holds the default database.
pub fn init() -> Result<PathBuf> {
    if let Some(dir) = config_dir() {
        ensure_dir(&dir)?;
    }
    let data = data_dir().context("Could not determine data directory")?;
    ensure_dir(&data)
}

/// Get the Drasta config directory (~/.config/drasta/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the Drasta data directory (~/.local/share/drasta/)
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to a file within the Drasta config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Get the path to a file within the Drasta data directory
pub fn data_path(filename: &str) -> Option<PathBuf> {
    data_dir().map(|p| p.join(filename))
}

/// Resolve a user-supplied config path.
///
/// Paths that exist as given are used directly; bare filenames that don't
/// exist in the working directory fall back to the Drasta config directory.
pub fn resolve_config_file(path: &Path) -> PathBuf {
    if path.exists() || path.components().count() > 1 {
        return path.to_path_buf();
    }
    path.to_str()
        .and_then(config_path)
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Ensure a directory exists, creating it and its parents when missing
pub fn ensure_dir(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    Ok(dir.to_path_buf())
}
