//! Configuration and default paths for the GitOps pipeline driver
//!
//! This crate provides:
//! - Platform paths for config and state files
//! - Configuration file discovery (TOML)
//! - The pipeline configuration (`PipelineConfig`)

pub mod config_file;
pub mod paths;
pub mod pipeline_config;

pub use config_file::{find_config_file, load_config_file};
pub use pipeline_config::{
    BranchesConfig, LocksConfig, PipelineConfig, QualityConfig, RepositoryConfig,
};

/// Default name of the mutual-exclusion region guarding the locked-branches file
pub const DEFAULT_LOCK_REGION: &str = "merge-request-locked-branches";
