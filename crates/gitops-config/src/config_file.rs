use std::{
    env,
    path::{Path, PathBuf},
};

const CONFIG_FILE: &str = ".gitops-pipeline.toml";

/// Find the config file to use
///
/// Searches for the config in:
/// 1. Current working directory as .gitops-pipeline.toml
/// 2. The user config dir as config.toml
/// 3. Home directory as .gitops-pipeline.toml
///
/// Returns the first existing path, None otherwise.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    if let Ok(user) = crate::paths::user_config_path() {
        if user.is_file() {
            return Some(user);
        }
    }

    get_home_config_path().filter(|p| p.is_file())
}

/// Load config file content from an explicit path
pub fn load_config_file(path: &Path) -> std::io::Result<String> {
    let content = std::fs::read_to_string(path)?;
    log::debug!("Loaded config from {}", path.display());
    Ok(content)
}

/// Get the path to the config file in the home directory
///
/// Returns ~/.gitops-pipeline.toml if HOME environment variable is set.
fn get_home_config_path() -> Option<PathBuf> {
    env::var_os("HOME").map(|home| PathBuf::from(home).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_file_reads_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "[branches]\n").unwrap();

        assert_eq!(load_config_file(&path).unwrap(), "[branches]\n");
    }

    #[test]
    fn test_load_config_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config_file(&dir.path().join("absent.toml")).is_err());
    }
}
