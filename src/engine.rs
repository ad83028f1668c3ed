//! The orchestrator owning the whole load/query lifecycle.
//!
//! A [`RagEngine`] starts with no index handle and acquires one either by a
//! successful [`load_and_index`](RagEngine::load_and_index) or by reopening a
//! previously persisted table during [`query`](RagEngine::query). There is no
//! reverse transition: once indexed, the engine stays indexed for its
//! lifetime. Repeated ingestion appends; identical sources are not
//! deduplicated.

use std::sync::Arc;

use crate::chunking::{Chunk, RecursiveSplitter};
use crate::config::RagConfig;
use crate::conversion::{ConversionBackend, DoclingConverter, DocumentSource};
use crate::providers::{CompletionBackend, EmbeddingBackend, OpenAiClient};
use crate::retrieval::Retriever;
use crate::stores::SqliteVectorIndex;
use crate::synthesis::AnswerSynthesizer;
use crate::types::RagError;

/// Summary of one ingestion call.
#[derive(Clone, Debug)]
pub struct IngestReport {
    /// Identifier of the ingested source.
    pub source: String,
    /// Number of chunks embedded and appended to the index.
    pub chunks_indexed: usize,
}

/// Everything a caller needs to render one answered question: the answer,
/// the scored provenance trail, and the K that produced it. Stateless UIs
/// render this value directly.
#[derive(Clone, Debug)]
pub struct QueryOutcome {
    pub answer: String,
    /// Retrieved chunks with L2 distances, most similar first.
    pub retrieved: Vec<(Chunk, f32)>,
    /// The configured retrieval K (the retrieved set may be smaller).
    pub k: usize,
}

/// Retrieval-augmented question answering over one vector index table.
///
/// Both public operations run to completion on the calling task; callers
/// needing concurrent ingestion must serialize externally.
pub struct RagEngine {
    config: RagConfig,
    converter: Arc<dyn ConversionBackend>,
    embeddings: Arc<dyn EmbeddingBackend>,
    splitter: RecursiveSplitter,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    index: Option<SqliteVectorIndex>,
}

impl RagEngine {
    pub fn builder() -> RagEngineBuilder {
        RagEngineBuilder::default()
    }

    /// Wires the production backends (OpenAI-compatible models, docling-serve
    /// conversion) from a validated configuration.
    pub fn from_config(config: RagConfig) -> Result<Self, RagError> {
        let client = Arc::new(OpenAiClient::from_config(&config)?);
        let converter = Arc::new(DoclingConverter::new(config.docling_base_url.clone()));
        Self::builder()
            .config(config)
            .converter(converter)
            .embeddings(client.clone())
            .completions(client)
            .build()
    }

    /// Converts, chunks, embeds, and appends one source document.
    ///
    /// Fails with the first error in that pipeline; nothing is written to
    /// the index unless every chunk of this call embedded successfully. A
    /// document that yields no chunks (empty after conversion) is a no-op.
    pub async fn load_and_index(&mut self, source: &str) -> Result<IngestReport, RagError> {
        let source = DocumentSource::parse(source)?;
        tracing::info!(source = %source, "loading document");

        let document = self.converter.convert(&source).await?;
        let chunks = self.splitter.split(&document);
        if chunks.is_empty() {
            tracing::warn!(source = %source, "document produced no chunks; index unchanged");
            return Ok(IngestReport {
                source: source.identifier(),
                chunks_indexed: 0,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = self.embeddings.embed_batch(&texts).await?;

        let mut index = match self.index.take() {
            Some(index) => index,
            None => {
                SqliteVectorIndex::create_or_open(&self.config.index_path, &self.config.table_name)
                    .await?
            }
        };
        let upserted = index.upsert(&chunks, &vectors).await;
        self.index = Some(index);
        upserted?;

        tracing::info!(source = %source, chunks = chunks.len(), "document indexed");
        Ok(IngestReport {
            source: source.identifier(),
            chunks_indexed: chunks.len(),
        })
    }

    /// Answers a question from the indexed content.
    ///
    /// Requires an index handle; when none is held, one reopen of the
    /// persisted table is attempted first. A reopen that finds nothing (or
    /// fails outright) surfaces as [`RagError::NotReady`]; the underlying
    /// reopen fault is logged, never propagated, so the user-facing message
    /// stays accurate.
    pub async fn query(&mut self, question: &str) -> Result<QueryOutcome, RagError> {
        if self.index.is_none() {
            match SqliteVectorIndex::open_existing(&self.config.index_path, &self.config.table_name)
                .await
            {
                Ok(Some(index)) => {
                    tracing::debug!(
                        table = %self.config.table_name,
                        "reopened persisted index table"
                    );
                    self.index = Some(index);
                }
                Ok(None) => return Err(RagError::NotReady),
                Err(err) => {
                    tracing::debug!(error = %err, "reopen attempt failed");
                    return Err(RagError::NotReady);
                }
            }
        }
        let Some(index) = self.index.as_ref() else {
            return Err(RagError::NotReady);
        };

        let retrieved = self.retriever.retrieve(index, question).await?;
        let context: Vec<Chunk> = retrieved.iter().map(|(chunk, _)| chunk.clone()).collect();
        let answer = self.synthesizer.synthesize(question, &context).await?;

        tracing::info!(
            retrieved = retrieved.len(),
            k = self.retriever.k(),
            "question answered"
        );
        Ok(QueryOutcome {
            answer,
            retrieved,
            k: self.retriever.k(),
        })
    }

    /// `true` once an index handle is held (after an ingest or a reopen).
    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }
}

/// Builder for [`RagEngine`], mainly to inject alternative backends.
#[derive(Default)]
pub struct RagEngineBuilder {
    config: Option<RagConfig>,
    converter: Option<Arc<dyn ConversionBackend>>,
    embeddings: Option<Arc<dyn EmbeddingBackend>>,
    completions: Option<Arc<dyn CompletionBackend>>,
}

impl RagEngineBuilder {
    #[must_use]
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn converter(mut self, converter: Arc<dyn ConversionBackend>) -> Self {
        self.converter = Some(converter);
        self
    }

    #[must_use]
    pub fn embeddings(mut self, embeddings: Arc<dyn EmbeddingBackend>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    #[must_use]
    pub fn completions(mut self, completions: Arc<dyn CompletionBackend>) -> Self {
        self.completions = Some(completions);
        self
    }

    /// Validates the configuration and assembles the engine.
    ///
    /// Fails with [`RagError::Config`] on invalid parameters or a missing
    /// backend.
    pub fn build(self) -> Result<RagEngine, RagError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let converter = self
            .converter
            .ok_or_else(|| RagError::Config("no conversion backend configured".to_string()))?;
        let embeddings = self
            .embeddings
            .ok_or_else(|| RagError::Config("no embedding backend configured".to_string()))?;
        let completions = self
            .completions
            .ok_or_else(|| RagError::Config("no completion backend configured".to_string()))?;

        let splitter = RecursiveSplitter::new(config.chunk_size, config.chunk_overlap)?;
        let retriever = Retriever::new(embeddings.clone(), config.search_k);
        let synthesizer = AnswerSynthesizer::new(completions);

        Ok(RagEngine {
            config,
            converter,
            embeddings,
            splitter,
            retriever,
            synthesizer,
            index: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockCompletionBackend, MockEmbeddingBackend};

    #[test]
    fn builder_requires_every_backend() {
        let result = RagEngine::builder().build();
        assert!(matches!(result, Err(RagError::Config(_))));

        let result = RagEngine::builder()
            .embeddings(Arc::new(MockEmbeddingBackend::default()))
            .completions(Arc::new(MockCompletionBackend::new("x")))
            .build();
        assert!(matches!(result, Err(RagError::Config(_))));
    }

    #[test]
    fn builder_rejects_invalid_chunk_parameters() {
        let config = RagConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..RagConfig::default()
        };
        let result = RagEngine::builder()
            .config(config)
            .converter(Arc::new(DoclingConverter::new("http://127.0.0.1:1")))
            .embeddings(Arc::new(MockEmbeddingBackend::default()))
            .completions(Arc::new(MockCompletionBackend::new("x")))
            .build();
        assert!(matches!(result, Err(RagError::Config(_))));
    }

    #[test]
    fn from_config_requires_an_api_key() {
        let config = RagConfig::default();
        assert!(matches!(
            RagEngine::from_config(config),
            Err(RagError::Config(_))
        ));
    }
}
