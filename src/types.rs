//! Crate-wide error taxonomy.
//!
//! Every pipeline phase reports failure through [`RagError`]; the variant
//! names the phase that failed so callers can surface a single
//! human-readable message without inspecting causes.

use thiserror::Error;

/// Errors produced by the document QA pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// The source could not be converted: unreachable, unsupported, or
    /// malformed.
    #[error("document conversion failed: {0}")]
    Conversion(String),

    /// Invalid configuration. Fatal at startup; never produced mid-pipeline.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The embedding backend rejected or failed the call.
    #[error("embedding request failed: {0}")]
    Embedding(String),

    /// The completion backend rejected or failed the call.
    #[error("answer generation failed: {0}")]
    Generation(String),

    /// Vector dimensionality disagrees with the existing index table.
    /// Requires operator intervention (e.g. a fresh table).
    #[error("embedding dimension mismatch: index stores {expected}, got {actual}")]
    Schema { expected: usize, actual: usize },

    /// A search was issued against a table with zero rows.
    #[error("vector index is empty")]
    EmptyIndex,

    /// A query arrived before any document was indexed and no persisted
    /// table could be reopened.
    #[error("no document indexed yet; load a document before querying")]
    NotReady,

    /// SQLite or filesystem fault inside the vector index.
    #[error("vector index storage error: {0}")]
    Storage(String),

    /// Local file IO during conversion.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
