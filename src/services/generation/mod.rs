use crate::error::Result;
use async_trait::async_trait;

/// Opaque text-generation capability, typically a local LLM runtime.
///
/// Process supervision and readiness handshakes belong to the implementation;
/// callers only see a finished completion or an error.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
