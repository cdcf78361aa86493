//! TOML-based configuration system for ReelVC.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Engine / storage settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Graph-view cache settings.
    #[serde(default)]
    pub graph: GraphConfig,

    /// Merge-request behaviour settings.
    #[serde(default)]
    pub merge: MergeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            graph: GraphConfig::default(),
            merge: MergeConfig::default(),
        }
    }
}

/// Engine / storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory for persistent data (the SQLite database).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Graph assembler cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Whether the in-memory graph cache is enabled.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Seconds a cached graph view stays fresh (default 300).
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

/// Merge-request behaviour configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Number of most-recent source-branch clips a merge request carries
    /// when no explicit clip list is supplied (default 200).
    #[serde(default = "default_clip_limit")]
    pub default_clip_limit: u32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            default_clip_limit: default_clip_limit(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/reelvc")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_clip_limit() -> u32 {
    200
}

impl AppConfig {
    /// Load a configuration file from disk.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Validate config values beyond what serde enforces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.merge.default_clip_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "merge.default_clip_limit".into(),
                detail: "must be at least 1".into(),
            });
        }
        if self.graph.cache_enabled && self.graph.cache_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "graph.cache_ttl_secs".into(),
                detail: "must be positive while the cache is enabled".into(),
            });
        }
        match self.engine.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "engine.log_level".into(),
                    detail: format!("unknown level '{other}'"),
                });
            }
        }
        Ok(())
    }
}
