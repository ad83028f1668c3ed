//! HTTP client for a docling-serve compatible conversion service.
//!
//! The service owns fetch, parse, OCR, and transcription for every supported
//! media type and returns one markdown rendition per document. Local plain
//! text and markdown skip the round-trip and are read directly.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::fs;
use url::Url;

use super::{ConversionBackend, Document, DocumentSource, is_supported_extension};
use crate::types::RagError;

/// Converter backed by a docling-serve deployment.
#[derive(Clone, Debug)]
pub struct DoclingConverter {
    http: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ConvertResponse {
    document: ConvertedDocument,
}

#[derive(Deserialize)]
struct ConvertedDocument {
    md_content: Option<String>,
}

impl DoclingConverter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn convert_remote(&self, url: &Url) -> Result<String, RagError> {
        let body = json!({
            "options": { "to_formats": ["md"] },
            "http_sources": [{ "url": url.as_str() }],
        });
        self.post_conversion(&body).await
    }

    async fn convert_payload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, RagError> {
        let body = json!({
            "options": { "to_formats": ["md"] },
            "file_sources": [{
                "base64_string": BASE64.encode(bytes),
                "filename": filename,
            }],
        });
        self.post_conversion(&body).await
    }

    async fn post_conversion(&self, body: &serde_json::Value) -> Result<String, RagError> {
        let endpoint = format!("{}/v1alpha/convert/source", self.base_url);
        let response = self
            .http
            .post(&endpoint)
            .json(body)
            .send()
            .await
            .map_err(|err| RagError::Conversion(format!("conversion service unreachable: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RagError::Conversion(format!(
                "conversion service returned {status}: {detail}"
            )));
        }

        let payload: ConvertResponse = response.json().await.map_err(|err| {
            RagError::Conversion(format!("malformed conversion service response: {err}"))
        })?;
        payload.document.md_content.ok_or_else(|| {
            RagError::Conversion("conversion service returned no markdown content".to_string())
        })
    }
}

#[async_trait::async_trait]
impl ConversionBackend for DoclingConverter {
    async fn convert(&self, source: &DocumentSource) -> Result<Document, RagError> {
        if let Some(ext) = source.extension() {
            if !is_supported_extension(&ext) {
                return Err(RagError::Conversion(format!(
                    "unsupported document type '.{ext}' for {source}"
                )));
            }
        }

        let content = match source {
            // Extensionless URLs are assumed to be HTML pages; the service
            // fetches and sniffs them itself.
            DocumentSource::Url(url) => self.convert_remote(url).await?,
            DocumentSource::Path(path) => {
                let Some(ext) = source.extension() else {
                    return Err(RagError::Conversion(format!(
                        "cannot determine document type of {source} (no extension)"
                    )));
                };
                match ext.as_str() {
                    "txt" | "md" | "markdown" => {
                        fs::read_to_string(path).await.map_err(|err| {
                            RagError::Conversion(format!("cannot read {source}: {err}"))
                        })?
                    }
                    _ => {
                        let bytes = fs::read(path).await.map_err(|err| {
                            RagError::Conversion(format!("cannot read {source}: {err}"))
                        })?;
                        let filename = path
                            .file_name()
                            .and_then(|name| name.to_str())
                            .unwrap_or("document");
                        self.convert_payload(filename, bytes).await?
                    }
                }
            }
        };

        tracing::debug!(source = %source, bytes = content.len(), "converted document");
        Ok(Document::new(content, source.identifier()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn unsupported_extension_fails_without_network() {
        // Point at a port nothing listens on: the check must trip first.
        let converter = DoclingConverter::new("http://127.0.0.1:1");
        let source = DocumentSource::parse("/tmp/malware.exe").unwrap();
        let err = converter.convert(&source).await.unwrap_err();
        assert!(matches!(err, RagError::Conversion(_)));
        assert!(err.to_string().contains(".exe"));
    }

    #[tokio::test]
    async fn missing_local_file_is_a_conversion_error() {
        let converter = DoclingConverter::new("http://127.0.0.1:1");
        let source = DocumentSource::parse("/definitely/not/here.txt").unwrap();
        assert!(matches!(
            converter.convert(&source).await,
            Err(RagError::Conversion(_))
        ));
    }

    #[tokio::test]
    async fn plain_text_reads_locally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        tokio::fs::write(&path, "plain contents").await.unwrap();

        let converter = DoclingConverter::new("http://127.0.0.1:1");
        let source = DocumentSource::Path(path.clone());
        let document = converter.convert(&source).await.unwrap();
        assert_eq!(document.content, "plain contents");
        assert_eq!(document.source, path.display().to_string());
    }

    #[tokio::test]
    async fn url_sources_round_trip_through_the_service() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1alpha/convert/source")
                    .json_body_partial(r#"{"http_sources":[{"url":"https://example.com/doc.pdf"}]}"#);
                then.status(200)
                    .json_body(json!({"document": {"md_content": "# Converted\n\nBody."}}));
            })
            .await;

        let converter = DoclingConverter::new(server.base_url());
        let source = DocumentSource::parse("https://example.com/doc.pdf").unwrap();
        let document = converter.convert(&source).await.unwrap();

        mock.assert_async().await;
        assert_eq!(document.content, "# Converted\n\nBody.");
        assert_eq!(document.source, "https://example.com/doc.pdf");
    }

    #[tokio::test]
    async fn binary_files_are_shipped_base64_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        tokio::fs::write(&path, b"%PDF-1.7 fake").await.unwrap();

        let server = MockServer::start_async().await;
        let expected_b64 = BASE64.encode(b"%PDF-1.7 fake");
        let mock = server
            .mock_async(move |when, then| {
                when.method(POST).path("/v1alpha/convert/source").json_body_partial(
                    json!({"file_sources": [{"base64_string": expected_b64, "filename": "scan.pdf"}]})
                        .to_string(),
                );
                then.status(200)
                    .json_body(json!({"document": {"md_content": "scanned text"}}));
            })
            .await;

        let converter = DoclingConverter::new(server.base_url());
        let document = converter
            .convert(&DocumentSource::Path(path))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(document.content, "scanned text");
    }

    #[tokio::test]
    async fn service_failure_surfaces_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1alpha/convert/source");
                then.status(500).body("converter exploded");
            })
            .await;

        let converter = DoclingConverter::new(server.base_url());
        let source = DocumentSource::parse("https://example.com/doc.pdf").unwrap();
        let err = converter.convert(&source).await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn missing_markdown_in_response_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1alpha/convert/source");
                then.status(200).json_body(json!({"document": {}}));
            })
            .await;

        let converter = DoclingConverter::new(server.base_url());
        let source = DocumentSource::parse("https://example.com/doc.pdf").unwrap();
        assert!(matches!(
            converter.convert(&source).await,
            Err(RagError::Conversion(_))
        ));
    }
}
