//! Query-time retrieval: embed the question, search the index.

use std::sync::Arc;

use crate::chunking::Chunk;
use crate::providers::EmbeddingBackend;
use crate::stores::SqliteVectorIndex;
use crate::types::RagError;

/// Thin composition of the embedding backend and the vector index with a
/// fixed top-K policy. K is configuration, not a per-call argument, which
/// keeps prompt size and generation cost bounded.
pub struct Retriever {
    embeddings: Arc<dyn EmbeddingBackend>,
    k: usize,
}

impl Retriever {
    pub fn new(embeddings: Arc<dyn EmbeddingBackend>, k: usize) -> Self {
        Self { embeddings, k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns up to `k` `(chunk, L2 distance)` pairs, most similar first.
    pub async fn retrieve(
        &self,
        index: &SqliteVectorIndex,
        question: &str,
    ) -> Result<Vec<(Chunk, f32)>, RagError> {
        let vector = self.embeddings.embed_query(question).await?;
        index.search(&vector, self.k).await
    }
}

/// Display similarity for an L2 distance: `max(0, 1 - d²/2)`.
///
/// Approximate by construction: it is the cosine-equivalent form of L2 and
/// only holds for unit-normalized embeddings. Presentation heuristic, not a
/// scoring contract.
pub fn similarity_from_distance(distance: f32) -> f32 {
    (1.0 - (distance * distance) / 2.0).max(0.0)
}
