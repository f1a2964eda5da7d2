//! Fitting configuration discovery
//!
//! Configurations are JSON files describing a clothing-avatar/base-avatar
//! pair. The catalog scans a directory once and serves lookups by path or
//! display name.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::app::models::ConfigInfo;
use crate::errors::ConfigError;

/// In-memory index of every configuration found in a directory
#[derive(Debug, Clone, Default)]
pub struct ConfigCatalog {
    configs: Vec<ConfigInfo>,
}

impl ConfigCatalog {
    /// Scan `dir` for `*.json` configurations
    ///
    /// Files that fail to parse are skipped with a warning rather than
    /// aborting the scan; a missing directory is an error.
    pub fn load_dir(dir: &Path) -> Result<Self, ConfigError> {
        if !dir.is_dir() {
            return Err(ConfigError::NotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut configs = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json") != Some(true) {
                continue;
            }
            match load_config(&path) {
                Ok(config) => configs.push(config),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable config"),
            }
        }

        configs.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        debug!(count = configs.len(), dir = %dir.display(), "loaded fitting configs");
        Ok(Self { configs })
    }

    pub fn configs(&self) -> &[ConfigInfo] {
        &self.configs
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Look up a configuration by its file path
    pub fn by_path(&self, path: &str) -> Option<&ConfigInfo> {
        let wanted = PathBuf::from(path);
        self.configs
            .iter()
            .find(|c| PathBuf::from(&c.config_path) == wanted)
    }

    /// Look up a configuration by display name, case-insensitively
    pub fn by_name(&self, name: &str) -> Option<&ConfigInfo> {
        self.configs
            .iter()
            .find(|c| c.display_name.eq_ignore_ascii_case(name))
    }
}

fn load_config(path: &Path) -> Result<ConfigInfo, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let mut config: ConfigInfo =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.config_path = path.display().to_string();
    if config.display_name.trim().is_empty() {
        config.display_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    Ok(config)
}
