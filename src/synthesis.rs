//! Grounded answer synthesis.
//!
//! One stuffed prompt per question: the retrieved chunks, in retrieval order
//! (most similar first), inside a `<context>` block, followed by the verbatim
//! question. The instruction line pins the model to the supplied context so
//! the answer cannot wander beyond the retrieved material.

use std::sync::Arc;

use crate::chunking::Chunk;
use crate::providers::CompletionBackend;
use crate::types::RagError;

pub struct AnswerSynthesizer {
    completions: Arc<dyn CompletionBackend>,
}

impl AnswerSynthesizer {
    pub fn new(completions: Arc<dyn CompletionBackend>) -> Self {
        Self { completions }
    }

    /// Renders the full generation prompt for a question and its context.
    pub fn build_prompt(question: &str, context: &[Chunk]) -> String {
        let context_block = context
            .iter()
            .map(|chunk| chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        format!(
            "Answer the following question based only on the provided context:\n\n\
             <context>\n{context_block}\n</context>\n\n\
             Question: {question}\n"
        )
    }

    /// Produces one complete answer; no streaming, no internal retry.
    pub async fn synthesize(
        &self,
        question: &str,
        context: &[Chunk],
    ) -> Result<String, RagError> {
        let prompt = Self::build_prompt(question, context);
        self.completions.complete(&prompt).await
    }
}
