//! Turning arbitrary document sources into normalized markdown.
//!
//! A [`DocumentSource`] names a local file or an HTTP(S) URL; a
//! [`ConversionBackend`] turns it into exactly one [`Document`] whose content
//! is a single markdown blob. Heading and paragraph structure is preserved
//! because the downstream splitter keys on it.
//!
//! Unsupported extensions are rejected here, before any network traffic, so
//! a misnamed upload fails fast and leaves the index untouched.

pub mod docling;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::RagError;

pub use docling::DoclingConverter;

/// File extensions the conversion service is expected to handle.
///
/// Image and audio entries rely on the service performing OCR and
/// transcription; this crate never does either itself.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "pdf", "docx", "pptx", "xlsx", "html", "htm", "txt", "md", "markdown", "png", "jpg", "jpeg",
    "tiff", "bmp", "wav", "mp3", "vtt",
];

/// Returns the extensions accepted by [`ConversionBackend`] implementations.
///
/// Exposed so a UI collaborator can enumerate uploadable types.
pub fn supported_extensions() -> &'static [&'static str] {
    SUPPORTED_EXTENSIONS
}

/// Returns `true` when `extension` (without the dot, any case) is supported.
pub fn is_supported_extension(extension: &str) -> bool {
    let lowered = extension.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.contains(&lowered.as_str())
}

/// A document location: local path or remote URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentSource {
    Path(PathBuf),
    Url(Url),
}

impl DocumentSource {
    /// Parses a raw string into a source.
    ///
    /// Anything starting with `http://` or `https://` must parse as a URL;
    /// everything else is taken as a filesystem path.
    pub fn parse(raw: &str) -> Result<Self, RagError> {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            let url = Url::parse(raw)
                .map_err(|err| RagError::Conversion(format!("invalid source URL '{raw}': {err}")))?;
            Ok(Self::Url(url))
        } else {
            Ok(Self::Path(PathBuf::from(raw)))
        }
    }

    /// The identifier recorded as `source` on every derived chunk.
    pub fn identifier(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Url(url) => url.to_string(),
        }
    }

    /// Lowercased extension of the path or URL path, if any.
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            Self::Path(path) => path.file_name()?.to_str()?.to_string(),
            Self::Url(url) => url.path_segments()?.next_back()?.to_string(),
        };
        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }
}

impl std::fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.identifier())
    }
}

/// One converted document: normalized markdown plus its source identifier.
///
/// Immutable after creation; one per ingested source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub source: String,
}

impl Document {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
        }
    }
}

/// Converts a source into one normalized [`Document`].
///
/// Implementations read the source but never mutate it. Failures are always
/// [`RagError::Conversion`]: unreachable, unsupported, or malformed input.
#[async_trait]
pub trait ConversionBackend: Send + Sync {
    async fn convert(&self, source: &DocumentSource) -> Result<Document, RagError>;
}
