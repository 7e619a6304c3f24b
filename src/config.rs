//! Config - Datasource Configuration
//!
//! Tunables for the viewport datasources and pivot materialization, loaded
//! from TOML. Every section falls back to its defaults when omitted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_LOG_LEVEL, DEFAULT_VIEWPORT_FIRST_ROW, DEFAULT_VIEWPORT_LAST_ROW,
    PIVOT_GRAND_TOTAL_LABEL, PIVOT_PLACEHOLDER_KEY, PIVOT_TOTALS_KEY, TREE_MIN_ROW_COUNT,
};
use crate::error::Result;

/// Config file name inside the per-user config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct GridConfig {
    /// Viewport datasource options
    pub viewport: ViewportConfig,
    /// Pull-model datasource options
    pub server_side: ServerSideConfig,
    /// Pivot materialization options
    pub pivot: PivotConfig,
    /// Logging options
    pub logging: LoggingConfig,
}

/// Viewport datasource options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewportConfig {
    /// First row of the window installed after a coordinate space change
    pub default_first_row: usize,
    /// Last row of the window installed after a coordinate space change
    pub default_last_row: usize,
    /// Minimum row count reported for tree tables
    pub tree_min_row_count: usize,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            default_first_row: DEFAULT_VIEWPORT_FIRST_ROW,
            default_last_row: DEFAULT_VIEWPORT_LAST_ROW,
            tree_min_row_count: TREE_MIN_ROW_COUNT,
        }
    }
}

/// Pull-model datasource options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSideConfig {
    /// Auto-size columns once after the first data arrives
    pub auto_size_columns: bool,
}

impl Default for ServerSideConfig {
    fn default() -> Self {
        Self {
            auto_size_columns: true,
        }
    }
}

/// Pivot materialization options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PivotConfig {
    /// Key segment for totals columns
    pub totals_key: String,
    /// Key segment for placeholder columns of unexpanded groups
    pub placeholder_key: String,
    /// Label for the grand totals row
    pub grand_total_label: String,
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            totals_key: PIVOT_TOTALS_KEY.to_string(),
            placeholder_key: PIVOT_PLACEHOLDER_KEY.to_string(),
            grand_total_label: PIVOT_GRAND_TOTAL_LABEL.to_string(),
        }
    }
}

/// Logging options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing directive (overridden by RUST_LOG)
    pub level: String,
    /// Directory for a daily rolling log file; stderr only when unset
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
        }
    }
}

impl GridConfig {
    /// Parse a config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a config file, returning defaults when it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load `config.toml` from the per-user config directory
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Location of `config.toml` in the per-user config directory
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "viewport-grid", "viewport-grid")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
