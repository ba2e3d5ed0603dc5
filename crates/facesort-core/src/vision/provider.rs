//! Vision backend trait and request/response types.
//!
//! `VisionProvider` is the façade the rest of the engine talks to; it hides
//! the concrete backend (Anthropic's Messages API is the only one shipped)
//! behind three operations that mirror the specification's vocabulary.

use crate::error::VisionError;
use crate::pipeline::EncodedPayload;
use crate::types::SubjectDetection;
use async_trait::async_trait;
use std::time::Duration;

/// Trait implemented by vision backends.
///
/// Uses `async_trait` because native async fn in trait is not object-safe —
/// the engine holds a `Box<dyn VisionProvider>` for dynamic dispatch.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Provider name for logging ("anthropic").
    fn name(&self) -> &str;

    /// Per-request timeout.
    fn timeout(&self) -> Duration;

    /// Produce a canonical facial/outfit description for a single reference
    /// photo, used when registering a roster entry.
    async fn describe_one_face(&self, image: &EncodedPayload) -> Result<String, VisionError>;

    /// Detect every subject visible in a photo, returning one
    /// `SubjectDetection` per distinct person.
    async fn detect_all_subjects(
        &self,
        image: &EncodedPayload,
    ) -> Result<Vec<SubjectDetection>, VisionError>;

    /// Score how likely two outfit/appearance descriptions refer to the same
    /// subject, in `[0.0, 1.0]`.
    async fn compare_two_descriptions(&self, a: &str, b: &str) -> Result<f64, VisionError>;
}

/// Extract a JSON value from a model response that may wrap it in prose or a
/// fenced code block (```json ... ```).
pub fn extract_json_block(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let after_fence = after_fence.strip_prefix("json").unwrap_or(after_fence);
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }
    if let (Some(start), Some(end)) = (trimmed.find(['{', '[']), trimmed.rfind(['}', ']'])) {
        if end >= start {
            return trimmed[start..=end].trim();
        }
    }
    trimmed
}
