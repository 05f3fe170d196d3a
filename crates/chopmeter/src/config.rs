use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_DIR: &str = "~/.chopmeter";
pub const DEFAULT_ACCOUNT: &str = "default";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CliConfig {
    pub account: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            account: DEFAULT_ACCOUNT.to_string(),
        }
    }
}

pub fn resolve_data_dir(data_dir: Option<&str>) -> PathBuf {
    let raw = data_dir.unwrap_or(DEFAULT_DATA_DIR);
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.json")
}

pub fn load_config(data_dir: &Path) -> Result<CliConfig> {
    let path = config_path(data_dir);

    if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    } else {
        Ok(CliConfig::default())
    }
}

pub fn save_config(data_dir: &Path, config: &CliConfig) -> Result<()> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    let content = serde_json::to_string_pretty(config)?;
    fs::write(config_path(data_dir), content)?;
    Ok(())
}

/// An account given on the command line wins and is remembered for later runs.
pub fn select_account(data_dir: &Path, requested: Option<&str>) -> String {
    let mut config = load_config(data_dir).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring unreadable config");
        CliConfig::default()
    });

    if let Some(account) = requested {
        if config.account != account {
            config.account = account.to_string();
            if let Err(e) = save_config(data_dir, &config) {
                tracing::warn!(error = %e, "could not save config");
            }
        }
    }

    config.account
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_uses_default_account() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(select_account(dir.path(), None), DEFAULT_ACCOUNT);
    }

    #[test]
    fn test_requested_account_is_remembered() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(select_account(dir.path(), Some("shop")), "shop");
        assert_eq!(select_account(dir.path(), None), "shop");
        assert_eq!(load_config(dir.path()).unwrap().account, "shop");
    }

    #[test]
    fn test_tilde_is_expanded() {
        let dir = resolve_data_dir(None);
        assert!(!dir.to_string_lossy().starts_with('~'));
        assert_eq!(resolve_data_dir(Some("/tmp/meter")), PathBuf::from("/tmp/meter"));
    }
}
