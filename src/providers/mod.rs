//! External model capabilities behind narrow async boundaries.
//!
//! The pipeline never interprets what an embedding means or how a completion
//! is produced; it only requires determinism per input per model version and
//! a stable vector dimensionality for the lifetime of an index table.
//!
//! [`openai`] talks to any OpenAI-compatible HTTP API; [`mock`] provides
//! deterministic in-process stand-ins for tests and offline runs.

pub mod mock;
pub mod openai;

use async_trait::async_trait;

use crate::types::RagError;

pub use mock::{MockCompletionBackend, MockEmbeddingBackend};
pub use openai::OpenAiClient;

/// Maps text to fixed-dimension vectors, at index time and query time.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embeds a batch of chunk texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Embeds a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

/// Produces a completion for a fully rendered prompt.
///
/// No streaming and no internal retry; callers may re-issue the whole
/// operation on failure.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, RagError>;
}
