//! Sub-configuration structs with defaults matching the specification.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where the analysis cache, roster, and lock file live.
    pub state_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("~/.facesort"),
        }
    }
}

/// Image discovery and decode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of images processed concurrently against the vision backend.
    pub parallel: usize,

    /// Extensions considered candidate photos during discovery.
    pub supported_formats: Vec<String>,

    /// JPEG re-encode quality used when downscaling oversized images.
    pub jpeg_quality: u8,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel: 4,
            supported_formats: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
                "gif".to_string(),
                "webp".to_string(),
                "heic".to_string(),
                "heif".to_string(),
            ],
            jpeg_quality: 85,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum payload size sent to the vision backend, in megabytes.
    pub max_payload_mb: f64,

    /// Maximum image dimension (width or height) before iterative downscale.
    pub max_dimension: u32,

    /// Vision RPC timeout in milliseconds.
    pub vision_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_payload_mb: 5.0,
            max_dimension: 8000,
            vision_timeout_ms: 60_000,
        }
    }
}

/// Clustering and matching thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Timestamp proximity considered an exact match; short-circuits visual comparison.
    pub t_exact_seconds: i64,

    /// Timestamp proximity considered a strong hint; visual score is floored at 0.85.
    pub t_high_seconds: i64,

    /// Minimum combined score to join an existing cluster in auto-cluster mode.
    pub cluster_threshold: f64,

    /// Minimum similarity to accept a database-mode match.
    pub match_threshold: f64,

    /// Score at or above which the cluster sweep stops early.
    pub early_terminate_score: f64,

    /// Retry attempts for a failed vision RPC.
    pub retry_attempts: u32,

    /// Linear backoff delay between retries, in seconds.
    pub retry_delay_secs: u64,

    /// API key (supports ${ENV_VAR} syntax).
    pub api_key: String,

    /// Model identifier passed to the backend.
    pub model: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            t_exact_seconds: 10,
            t_high_seconds: 30,
            cluster_threshold: 0.5,
            match_threshold: 0.7,
            early_terminate_score: 0.95,
            retry_attempts: 3,
            retry_delay_secs: 2,
            api_key: "${ANTHROPIC_API_KEY}".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
        }
    }
}

/// Analysis-cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether the on-disk analysis cache is consulted/updated at all.
    pub enabled: bool,

    /// Flush the cache to disk after this many new successful entries.
    pub flush_interval: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            flush_interval: 5,
        }
    }
}

/// Roster settings (database mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Filename, relative to `general.state_dir`, of the roster JSON file.
    pub file_name: String,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            file_name: "roster.json".to_string(),
        }
    }
}

/// Output layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Copy source files into the destination layout instead of moving them.
    pub copy_mode: bool,

    /// Write the `organization_log.json` report artifact.
    pub write_report: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            copy_mode: false,
            write_report: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace.
    pub level: String,

    /// Log format: "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
