use crate::infrastructure::config::ensure_default_configs;
use crate::infrastructure::error::ApiError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub logs_dir: PathBuf,
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, ApiError> {
    let config_dir = workspace_root.join("config");
    let logs_dir = workspace_root.join("logs");

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_configs(&config_dir)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        logs_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_creates_dirs_and_seeds_config() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = bootstrap_workspace(dir.path()).expect("bootstrap");

        assert!(result.config_dir.is_dir());
        assert!(result.logs_dir.is_dir());
        assert!(result.config_dir.join("app.json").is_file());

        // Idempotent on an already-bootstrapped workspace.
        bootstrap_workspace(dir.path()).expect("bootstrap again");
    }
}
