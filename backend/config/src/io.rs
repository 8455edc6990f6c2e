//! Config file location and loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info};

use crate::schema::IntentForgeConfig;

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Explicit config file path.
pub const CONFIG_PATH_VAR: &str = "INTENTFORGE_CONFIG";
/// Directory holding `config.yaml`.
pub const CONFIG_DIR_VAR: &str = "INTENTFORGE_CONFIG_DIR";

/// Priority: `INTENTFORGE_CONFIG_DIR` > `~/.intentforge/` > `./.intentforge/`.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_DIR_VAR) {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".intentforge"),
        None => PathBuf::from(".intentforge"),
    }
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Priority: `explicit` (the `--config` flag) > `INTENTFORGE_CONFIG` > `config_dir()/config.yaml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var(CONFIG_PATH_VAR) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => config_file_path(&config_dir()),
    }
}

/// Read the raw YAML text. `Ok(None)` when the file does not exist.
pub async fn read_config_text(path: &Path) -> Result<Option<String>> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    Ok(Some(raw))
}

/// Parse config YAML. An empty document is the default config.
pub fn parse_config(raw: &str) -> Result<IntentForgeConfig> {
    if raw.trim().is_empty() {
        return Ok(IntentForgeConfig::default());
    }
    serde_yaml::from_str(raw).context("Failed to parse config YAML")
}

/// Load and parse the config from disk; defaults when the file is absent.
pub async fn load_config(path: &Path) -> Result<IntentForgeConfig> {
    let Some(raw) = read_config_text(path).await? else {
        return Ok(IntentForgeConfig::default());
    };
    let config = parse_config(&raw).with_context(|| format!("In {}", path.display()))?;
    info!(path = %path.display(), providers = config.providers.len(), "Loaded config");
    Ok(config)
}
