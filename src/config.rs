//! Loader Configuration
//!
//! Stored as RON, by default at `<config dir>/bonnie-blocks/loader.ron`.
//! Every field is optional in the file; missing fields take their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default config file name inside the app config directory
pub const CONFIG_FILE: &str = "loader.ron";

/// Default manifest file name for directory batches
pub const MANIFEST_FILE: &str = "manifest.txt";

/// How a batch resolves references between files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadStrategy {
    /// Execute files in order, retrying the ones with unresolved references
    #[default]
    Retry,
    /// Parse everything first, then instantiate in dependency order
    TwoPhase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Extensions (without dot) treated as declaration files
    pub extensions: Vec<String>,
    /// Retry files that failed on forward references
    pub recurse: bool,
    pub strategy: LoadStrategy,
    /// Manifest file name looked up in batch directories
    pub manifest: String,
    /// Upper bound on counting passes before the forced pass
    pub max_passes: Option<usize>,
    /// Default `env_logger` filter, overridden by `RUST_LOG`
    pub log_filter: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["ron".to_string()],
            recurse: true,
            strategy: LoadStrategy::Retry,
            manifest: MANIFEST_FILE.to_string(),
            max_passes: None,
            log_filter: "info".to_string(),
        }
    }
}

impl LoaderConfig {
    /// Default config location, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("bonnie-blocks").join(CONFIG_FILE))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load an explicit config, or the default one when it exists
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let config = ron::ser::PrettyConfig::new().indentor("  ".to_string());
        let text = ron::ser::to_string_pretty(self, config)
            .map_err(|e| ConfigError::Serialization(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
