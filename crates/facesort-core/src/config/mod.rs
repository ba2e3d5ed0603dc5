//! Configuration management for facesort.
//!
//! Configuration is loaded from `~/.facesort/config.toml` with sensible defaults.
//! All config structs implement `Default` with values from the specification.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for facesort.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub processing: ProcessingConfig,
    pub limits: LimitsConfig,
    pub vision: VisionConfig,
    pub cache: CacheConfig,
    pub roster: RosterConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location (~/.facesort/config.toml).
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.facesort.facesort/config.toml
    /// - Linux: ~/.config/facesort/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\facesort\config\config.toml
    ///
    /// Falls back to ~/.facesort/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "facesort", "facesort")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".facesort").join("config.toml")
            })
    }

    /// Get the resolved state directory path (with ~ expansion).
    pub fn state_dir(&self) -> PathBuf {
        let path_str = self.general.state_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Path to the persisted analysis cache file.
    pub fn cache_path(&self) -> PathBuf {
        self.state_dir().join("analysis_cache.json")
    }

    /// Path to the persisted roster file.
    pub fn roster_path(&self) -> PathBuf {
        self.state_dir().join(&self.roster.file_name)
    }

    /// Path to the advisory single-writer lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("facesort.lock")
    }

    /// Resolve `${ENV_VAR}`-style overrides for values that support it, and
    /// apply the documented environment-variable overrides for numeric
    /// thresholds. CLI flags are applied on top of this by the caller and take
    /// final precedence.
    fn apply_env_overrides(&mut self) {
        if let Some(key) = resolve_env_var(&self.vision.api_key) {
            self.vision.api_key = key;
        }
        if let Ok(v) = std::env::var("T_EXACT_SECONDS") {
            if let Ok(parsed) = v.parse() {
                self.vision.t_exact_seconds = parsed;
            }
        }
        if let Ok(v) = std::env::var("T_HIGH_SECONDS") {
            if let Ok(parsed) = v.parse() {
                self.vision.t_high_seconds = parsed;
            }
        }
        if let Ok(v) = std::env::var("VISION_CONFIDENCE_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                // Applies to both modes' thresholds since the run mode isn't
                // known yet at config-load time; `--confidence` on the CLI
                // overrides whichever one the chosen mode actually uses.
                self.vision.match_threshold = parsed;
                self.vision.cluster_threshold = parsed;
            }
        }
        if let Ok(v) = std::env::var("MAX_IMAGE_MB") {
            if let Ok(parsed) = v.parse() {
                self.limits.max_payload_mb = parsed;
            }
        }
        if let Ok(v) = std::env::var("MAX_IMAGE_DIM") {
            if let Ok(parsed) = v.parse() {
                self.limits.max_dimension = parsed;
            }
        }
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok()
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
