//! OpenAI-compatible embedding and chat-completion client.
//!
//! Works against api.openai.com or any server speaking the same surface
//! (`/v1/embeddings`, `/v1/chat/completions`). One client serves both
//! capabilities so a single configuration covers index-time and query-time
//! calls.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{CompletionBackend, EmbeddingBackend};
use crate::config::RagConfig;
use crate::types::RagError;

#[derive(Clone, Debug)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
    embedding_model: String,
    completion_model: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        embedding_model: impl Into<String>,
        completion_model: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            embedding_model: embedding_model.into(),
            completion_model: completion_model.into(),
        }
    }

    pub fn from_config(config: &RagConfig) -> Result<Self, RagError> {
        if config.openai_api_key.is_empty() {
            return Err(RagError::Config(
                "openai_api_key is empty; set OPENAI_API_KEY".to_string(),
            ));
        }
        Ok(Self::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            config.embedding_model.clone(),
            config.completion_model.clone(),
        ))
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.embedding_model,
            "input": texts,
        });
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| RagError::Embedding(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "embedding endpoint returned {status}: {detail}"
            )));
        }

        let payload: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|err| RagError::Embedding(format!("malformed embedding response: {err}")))?;

        let mut items = payload.data;
        if items.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "requested {} embeddings, received {}",
                texts.len(),
                items.len()
            )));
        }
        // The API may return items out of order; `index` is authoritative.
        items.sort_by_key(|item| item.index);
        Ok(items.into_iter().map(|item| item.embedding).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let input = [text.to_string()];
        let mut vectors = self.embed_batch(&input).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::Embedding("empty embedding response".to_string()))
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.completion_model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| RagError::Generation(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RagError::Generation(format!(
                "completion endpoint returned {status}: {detail}"
            )));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|err| RagError::Generation(format!("malformed completion response: {err}")))?;
        let choice = payload
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Generation("completion response had no choices".to_string()))?;
        Ok(choice.message.content)
    }
}
