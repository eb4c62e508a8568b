use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::Ecosystem;

/// Root configuration structure, deserialized from `.depdeck/config.toml`.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub scan: ScanConfig,
    pub registry: RegistryConfig,
    pub tools: ToolsConfig,
}

/// What gets scanned.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Include the live environment listing (`uv pip list`, `npm ls`).
    pub installed: bool,
    /// Ecosystems never scanned, even when their manifests are present.
    pub exclude: Vec<Ecosystem>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            installed: true,
            exclude: Vec::new(),
        }
    }
}

/// Registry lookups.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    pub timeout_secs: u64,
    /// Concurrent lookups per chunk.
    pub batch_size: usize,
    /// Lifetime of the cached PyPI name index.
    pub index_ttl_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            batch_size: 10,
            index_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn index_ttl(&self) -> Duration {
        Duration::from_secs(self.index_ttl_secs)
    }
}

/// Executables the backends delegate to.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub uv: String,
    pub python: String,
    pub npm: String,
    pub node: String,
    pub go: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            uv: "uv".to_string(),
            python: "python3".to_string(),
            npm: "npm".to_string(),
            node: "node".to_string(),
            go: "go".to_string(),
        }
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override`, the path passed via `--config`
/// 2. `<project_path>/.depdeck/config.toml`
/// 3. `~/.config/depdeck/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = project_path.join(".depdeck").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home_config) = user_config_path() {
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    Ok(Config::default())
}

fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("depdeck").join("config.toml"))
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}
