//! Pipeline configuration
//!
//! Configuration loaded from .gitops-pipeline.toml. Every field has a default,
//! so a partial file only needs to name what differs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{paths, DEFAULT_LOCK_REGION};

/// Complete configuration for one pipeline invocation
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub branches: BranchesConfig,

    #[serde(default)]
    pub locks: LocksConfig,

    #[serde(default)]
    pub quality: QualityConfig,
}

/// Repository the pipeline builds
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RepositoryConfig {
    /// Target repository URL (push/manual checkouts and merge target)
    #[serde(default)]
    pub url: String,

    /// Workspace directory, cleared before every checkout
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Branch built by manual runs when none is given on the command line
    #[serde(default)]
    pub manual_branch: Option<String>,

    /// Committer name for the pre-build merge of a merge request
    #[serde(default = "default_merge_user_name")]
    pub merge_user_name: String,

    /// Committer email for the pre-build merge of a merge request
    #[serde(default = "default_merge_user_email")]
    pub merge_user_email: String,
}

/// Branch-class regular expressions, matched against the whole ref
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BranchesConfig {
    #[serde(default = "default_development_pattern")]
    pub development: String,

    #[serde(default = "default_test_pattern")]
    pub test: String,

    #[serde(default = "default_production_pattern")]
    pub production: String,
}

/// Locked-branches store settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LocksConfig {
    /// Locked-branches file, one branch per line
    #[serde(default = "paths::default_locked_branches_path")]
    pub file: PathBuf,

    /// Name of the mutual-exclusion region shared by all pipeline instances
    #[serde(default = "default_region")]
    pub region: String,

    /// Directory holding the region lock files
    #[serde(default = "paths::default_region_dir")]
    pub region_dir: PathBuf,

    /// Maximum time to wait for the region before giving up
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

/// Code-quality server settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QualityConfig {
    #[serde(default)]
    pub server_url: String,

    /// Name of the environment variable holding the server token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    #[serde(default = "default_query_interval_secs")]
    pub query_interval_secs: u64,

    /// Upper bound on the whole wait; unbounded when absent
    #[serde(default)]
    pub max_wait_secs: Option<u64>,

    /// Scanner report holding the background task id
    #[serde(default = "default_report_task_file")]
    pub report_task_file: PathBuf,
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

fn default_merge_user_name() -> String {
    "gitops-pipeline".to_string()
}

fn default_merge_user_email() -> String {
    "gitops-pipeline@localhost".to_string()
}

fn default_development_pattern() -> String {
    "^develop$".to_string()
}

fn default_test_pattern() -> String {
    "^release/.+$".to_string()
}

fn default_production_pattern() -> String {
    "^master$".to_string()
}

fn default_region() -> String {
    DEFAULT_LOCK_REGION.to_string()
}

fn default_acquire_timeout_secs() -> u64 {
    600
}

fn default_token_env() -> String {
    "SONAR_TOKEN".to_string()
}

fn default_query_interval_secs() -> u64 {
    10
}

fn default_report_task_file() -> PathBuf {
    PathBuf::from(".scannerwork/report-task.txt")
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            workspace: default_workspace(),
            manual_branch: None,
            merge_user_name: default_merge_user_name(),
            merge_user_email: default_merge_user_email(),
        }
    }
}

impl Default for BranchesConfig {
    fn default() -> Self {
        Self {
            development: default_development_pattern(),
            test: default_test_pattern(),
            production: default_production_pattern(),
        }
    }
}

impl Default for LocksConfig {
    fn default() -> Self {
        Self {
            file: paths::default_locked_branches_path(),
            region: default_region(),
            region_dir: paths::default_region_dir(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            token_env: default_token_env(),
            query_interval_secs: default_query_interval_secs(),
            max_wait_secs: None,
            report_task_file: default_report_task_file(),
        }
    }
}

impl PipelineConfig {
    /// Load config from an explicit path, or discover one, or use defaults
    ///
    /// A file that exists but does not parse is an error: a pipeline must not
    /// run with branch patterns it did not intend.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => crate::find_config_file(),
        };

        match path {
            Some(path) => {
                let config = Self::load_from_path(&path)?;
                log::info!("Loaded pipeline config from {}", path.display());
                Ok(config)
            }
            None => {
                log::debug!("No config file found, using default pipeline config");
                Ok(Self::default())
            }
        }
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = crate::load_config_file(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Parse config from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.branches.development, "^develop$");
        assert_eq!(config.branches.production, "^master$");
        assert_eq!(config.locks.region, DEFAULT_LOCK_REGION);
        assert_eq!(config.locks.acquire_timeout_secs, 600);
        assert_eq!(config.quality.query_interval_secs, 10);
        assert!(config.quality.max_wait_secs.is_none());
        assert_eq!(config.repository.workspace, PathBuf::from("."));
    }

    #[test]
    fn test_config_deserialize() {
        let toml = r#"
            [repository]
            url = "git@gitlab.example.com:team/app.git"

            [branches]
            development = "^dev$"
            test = "^test$"
            production = "^prod$"

            [locks]
            file = "/var/lib/ci/locked"
            acquire_timeout_secs = 30

            [quality]
            server_url = "https://sonar.example.com"
            max_wait_secs = 3600
        "#;
        let config = PipelineConfig::from_toml(toml).unwrap();
        assert_eq!(config.repository.url, "git@gitlab.example.com:team/app.git");
        assert_eq!(config.branches.development, "^dev$");
        assert_eq!(config.branches.test, "^test$");
        assert_eq!(config.locks.file, PathBuf::from("/var/lib/ci/locked"));
        assert_eq!(config.locks.acquire_timeout_secs, 30);
        assert_eq!(config.quality.max_wait_secs, Some(3600));
        // region should use default
        assert_eq!(config.locks.region, DEFAULT_LOCK_REGION);
    }

    #[test]
    fn test_config_deserialize_partial() {
        let toml = r#"
            [branches]
            production = "^main$"
        "#;
        let config = PipelineConfig::from_toml(toml).unwrap();
        assert_eq!(config.branches.production, "^main$");
        // Other fields should use defaults
        assert_eq!(config.branches.development, "^develop$");
        assert_eq!(config.quality.token_env, "SONAR_TOKEN");
        assert_eq!(
            config.quality.report_task_file,
            PathBuf::from(".scannerwork/report-task.txt")
        );
    }

    #[test]
    fn test_load_explicit_path_invalid_toml_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[branches\ndevelopment = ").unwrap();

        assert!(PipelineConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "[quality]\nquery_interval_secs = 3\n").unwrap();

        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.quality.query_interval_secs, 3);
    }
}
