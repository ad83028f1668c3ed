//! Deterministic in-process backends for tests and offline development.
//!
//! The embedding mock hashes tokens into a fixed-dimension feature vector, so
//! texts sharing vocabulary land close together; that is enough signal for
//! retrieval tests without any model. Vectors are unit-normalized, matching
//! the assumption behind the display similarity heuristic.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CompletionBackend, EmbeddingBackend};
use crate::types::RagError;

pub const DEFAULT_MOCK_DIMENSIONS: usize = 32;

/// Feature-hashed bag-of-tokens embedder. Same text, same vector, always.
#[derive(Clone, Debug)]
pub struct MockEmbeddingBackend {
    dimensions: usize,
}

impl Default for MockEmbeddingBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MOCK_DIMENSIONS)
    }
}

impl MockEmbeddingBackend {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut accumulator = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            for (position, slot) in accumulator.iter_mut().enumerate() {
                let mut hasher = DefaultHasher::new();
                token.hash(&mut hasher);
                position.hash(&mut hasher);
                let bits = hasher.finish();
                *slot += ((bits & 0xFFFF) as f32 / 65_535.0) - 0.5;
            }
        }

        let norm = accumulator.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut accumulator {
                *value /= norm;
            }
        } else {
            // Tokenless input still needs a valid unit vector.
            accumulator[0] = 1.0;
        }
        accumulator
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError> {
        Ok(self.embed_text(text))
    }
}

/// Completion backend that returns a canned answer and records every prompt
/// it sees, so tests can assert on the rendered context.
#[derive(Debug, Default)]
pub struct MockCompletionBackend {
    answer: String,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletionBackend {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionBackend for MockCompletionBackend {
    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        if let Ok(mut guard) = self.prompts.lock() {
            guard.push(prompt.to_string());
        }
        Ok(self.answer.clone())
    }
}
