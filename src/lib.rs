//! Ask natural-language questions of a single document, grounded in its
//! content.
//!
//! ```text
//! Source (path | URL) ──► conversion::DoclingConverter ──► Document (markdown)
//!                                                              │
//!                                 chunking::RecursiveSplitter ◄┘
//!                                             │
//!            providers::EmbeddingBackend ◄────┤ index phase
//!                         │                   │
//!                         └──► stores::SqliteVectorIndex (append-only)
//!
//! Question ──► retrieval::Retriever ──► (Chunk, L2 distance) pairs
//!                                             │
//!                     synthesis::AnswerSynthesizer ──► QueryOutcome
//! ```
//!
//! [`engine::RagEngine`] owns the lifecycle: `load_and_index` runs the index
//! phase end to end, `query` runs the retrieval phase and synthesizes one
//! grounded answer with a distance-scored provenance trail. An engine with
//! no in-memory handle transparently reopens a previously persisted table on
//! its first query.

pub mod chunking;
pub mod config;
pub mod conversion;
pub mod engine;
pub mod providers;
pub mod retrieval;
pub mod stores;
pub mod synthesis;
pub mod types;

pub use chunking::{Chunk, RecursiveSplitter};
pub use config::RagConfig;
pub use conversion::{ConversionBackend, DoclingConverter, Document, DocumentSource};
pub use engine::{IngestReport, QueryOutcome, RagEngine};
pub use providers::{CompletionBackend, EmbeddingBackend, OpenAiClient};
pub use retrieval::{Retriever, similarity_from_distance};
pub use stores::SqliteVectorIndex;
pub use synthesis::AnswerSynthesizer;
pub use types::RagError;
