//! Configuration and state directory paths
//!
//! Uses XDG directories via `dirs` crate with fallbacks.
//!
//! Platform-specific locations:
//! - Linux: `~/.config/gitops-pipeline/`, `~/.local/share/gitops-pipeline/`
//! - macOS: `~/Library/Application Support/gitops-pipeline/`
//! - Windows: `%APPDATA%\gitops-pipeline\`, `%LOCALAPPDATA%\gitops-pipeline\`

use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_NAME: &str = "gitops-pipeline";
const LOCKED_BRANCHES_FILE: &str = "merge-request-locked-branches";

/// Get the application config directory (not created)
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    Ok(base.join(APP_NAME))
}

/// Get the directory holding shared pipeline state such as the locked-branches file
///
/// Falls back to the system temp directory on hosts without a data dir
/// (service accounts without a home are common on CI agents).
pub fn state_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Get path to the user-level config file
pub fn user_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Default path of the locked-branches file
pub fn default_locked_branches_path() -> PathBuf {
    state_dir().join(LOCKED_BRANCHES_FILE)
}

/// Default directory for mutual-exclusion region lock files
pub fn default_region_dir() -> PathBuf {
    state_dir().join("regions")
}
