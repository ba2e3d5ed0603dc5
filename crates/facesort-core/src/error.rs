//! Error types for the facesort engine.
//!
//! Errors are organized by stage so failures carry enough context (paths, stage
//! names, HTTP status codes) to classify as retryable, fatal, or merely logged.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for facesort operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Vision backend error: {0}")]
    Vision(#[from] VisionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Image I/O, decode, and metadata errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Metadata extraction failed for {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error for {path}: {message}")]
    Io { path: PathBuf, message: String },
}

/// Errors from the vision backend RPC façade.
///
/// Classification into retryable/fatal drives the retry policy in
/// `crate::vision::retry` and the process exit code in the CLI.
#[derive(Error, Debug, Clone)]
pub enum VisionError {
    /// Transport or HTTP-level failure. `status_code` is `None` for connection-level
    /// failures (DNS, refused, reset) and `Some` for HTTP responses.
    #[error("Vision backend HTTP error: {message}")]
    Http {
        message: String,
        status_code: Option<u16>,
    },

    /// The call did not complete within the configured timeout.
    #[error("Vision backend timed out in {stage} after {timeout_ms}ms")]
    Timeout { stage: String, timeout_ms: u64 },

    /// Authentication/credential failure. Never retried.
    #[error("Vision backend authentication failed: {0}")]
    Auth(String),

    /// Quota/billing failure. Never retried.
    #[error("Vision backend quota exhausted: {0}")]
    Quota(String),

    /// The request itself was malformed. Never retried.
    #[error("Vision backend rejected the request: {0}")]
    InvalidArgument(String),

    /// The response body could not be parsed into the expected shape.
    #[error("Failed to parse vision backend response: {0}")]
    Parse(String),
}

/// Convenience type alias for facesort results.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Convenience type alias for vision-specific results.
pub type VisionResult<T> = std::result::Result<T, VisionError>;
