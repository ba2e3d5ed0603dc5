//! Vision backend abstraction.
//!
//! `VisionProvider` is the trait the rest of the engine depends on;
//! `anthropic` is the one concrete backend shipped, and `retry` wraps any
//! provider call with the specification's linear backoff policy.

pub mod anthropic;
pub mod provider;
pub mod retry;

pub use provider::{extract_json_block, VisionProvider};

use crate::config::VisionConfig;
use crate::error::{ConfigError, VisionError};

/// Build the configured vision provider.
///
/// Only one backend is shipped today, but the factory exists so a second
/// backend can be added without the engine's call sites changing.
pub fn build_provider(config: &VisionConfig) -> Result<Box<dyn VisionProvider>, ConfigError> {
    if config.api_key.is_empty() || config.api_key.starts_with("${") {
        return Err(ConfigError::ValidationError(
            "vision backend API key is not set; export the referenced environment variable"
                .to_string(),
        ));
    }
    Ok(Box::new(anthropic::AnthropicVisionProvider::new(
        &config.api_key,
        &config.model,
    )))
}

/// Call a provider operation with the configured retry policy.
pub async fn call_with_retry<T, F, Fut>(
    config: &VisionConfig,
    f: F,
) -> Result<T, VisionError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, VisionError>>,
{
    retry::with_retry(config.retry_attempts, config.retry_delay_secs, f).await
}
