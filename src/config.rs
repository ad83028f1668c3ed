//! Immutable pipeline configuration.
//!
//! One [`RagConfig`] is constructed at process start (usually via
//! [`RagConfig::from_env`]) and handed to the engine by value; nothing in the
//! crate reads ambient process state after that point.

use std::env;
use std::path::PathBuf;

use crate::types::RagError;

/// Static configuration for the whole pipeline.
///
/// All values are fixed for the lifetime of the process; there is no live
/// reconfiguration.
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next.
    pub chunk_overlap: usize,
    /// Embedding model identifier passed to the embedding backend.
    pub embedding_model: String,
    /// Completion model identifier passed to the generation backend.
    pub completion_model: String,
    /// SQLite database file backing the vector index.
    pub index_path: PathBuf,
    /// Name of the logical chunk table inside the database.
    pub table_name: String,
    /// Number of chunks retrieved per query.
    pub search_k: usize,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// API key for the OpenAI-compatible API.
    pub openai_api_key: String,
    /// Base URL of the docling-serve conversion service.
    pub docling_base_url: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            embedding_model: "text-embedding-3-small".to_string(),
            completion_model: "gpt-4o".to_string(),
            index_path: PathBuf::from("data/chunks.sqlite3"),
            table_name: "doc_chunks".to_string(),
            search_k: 4,
            openai_base_url: "https://api.openai.com".to_string(),
            openai_api_key: String::new(),
            docling_base_url: "http://localhost:5001".to_string(),
        }
    }
}

impl RagConfig {
    /// Builds a configuration from environment variables, loading a `.env`
    /// file first when one is present.
    ///
    /// `OPENAI_API_KEY` is required; every `DOCSAGE_*` variable falls back to
    /// its default. Fails with [`RagError::Config`] on a missing key, an
    /// unparsable numeric value, or parameters rejected by
    /// [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, RagError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            chunk_size: parse_var("DOCSAGE_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_var("DOCSAGE_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            embedding_model: string_var("DOCSAGE_EMBEDDING_MODEL", defaults.embedding_model),
            completion_model: string_var("DOCSAGE_COMPLETION_MODEL", defaults.completion_model),
            index_path: env::var("DOCSAGE_INDEX_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.index_path),
            table_name: string_var("DOCSAGE_TABLE_NAME", defaults.table_name),
            search_k: parse_var("DOCSAGE_SEARCH_K", defaults.search_k)?,
            openai_base_url: string_var("DOCSAGE_OPENAI_BASE_URL", defaults.openai_base_url),
            openai_api_key: env::var("OPENAI_API_KEY")
                .map_err(|_| RagError::Config("OPENAI_API_KEY is not set".to_string()))?,
            docling_base_url: string_var("DOCSAGE_DOCLING_URL", defaults.docling_base_url),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the chunking and retrieval parameters.
    ///
    /// `chunk_overlap < chunk_size` is required: an overlap as large as the
    /// chunk itself would stop the splitter from making forward progress.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.search_k == 0 {
            return Err(RagError::Config("search_k must be positive".to_string()));
        }
        if self.table_name.is_empty()
            || !self
                .table_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            || self
                .table_name
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit())
        {
            return Err(RagError::Config(format!(
                "table_name '{}' must be a plain identifier",
                self.table_name
            )));
        }
        Ok(())
    }
}

fn string_var(name: &str, default: String) -> String {
    env::var(name).unwrap_or(default)
}

fn parse_var(name: &str, default: usize) -> Result<usize, RagError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<usize>()
            .map_err(|err| RagError::Config(format!("{name}='{raw}' is not a number: {err}"))),
        Err(_) => Ok(default),
    }
}
