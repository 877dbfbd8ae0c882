//! The `TextGenerator` trait -- the seam to an external language model.
//!
//! Concrete generators (OpenAI, scripted fakes in tests) implement this
//! trait. It is object-safe so the orchestrator can hold an
//! `Arc<dyn TextGenerator>` shared across requests.

use async_trait::async_trait;

/// Failures from a text generator.
///
/// All variants are recoverable: the orchestrator falls back to the
/// deterministic planner on any of them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("text generation is not configured")]
    NotConfigured,

    #[error("text generation request failed: {0}")]
    RequestFailed(String),

    #[error("text generation returned no text")]
    EmptyResponse,
}

/// Adapter interface for a prompt-in, text-out generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short provider name for logs (e.g. "openai").
    fn name(&self) -> &str;

    /// Generate text for `prompt`.
    ///
    /// The returned text is opaque; callers validate it themselves.
    async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError>;
}

// Compile-time assertion: TextGenerator must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn TextGenerator) {}
};
