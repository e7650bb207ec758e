//! Format detection and raw text extraction.

use tracing::debug;

use outreach_shared::{OutreachError, Result};

use crate::ProfileSource;

/// Document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Structured profile, deserialized directly.
    Json,
    Text,
    Markdown,
    Pdf,
}

impl DocumentKind {
    /// Detect the format from a source's filename hint.
    pub fn detect(source: &ProfileSource) -> Result<Self> {
        let ext = source.extension().unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "txt" | "text" => Ok(Self::Text),
            "md" | "markdown" => Ok(Self::Markdown),
            "pdf" => Ok(Self::Pdf),
            _ => Err(OutreachError::UnsupportedFormat {
                extension: if ext.is_empty() {
                    source.filename_hint().to_string()
                } else {
                    ext
                },
            }),
        }
    }
}

/// Load the raw bytes of a source.
pub async fn read_bytes(source: &ProfileSource) -> Result<Vec<u8>> {
    match source {
        ProfileSource::Path(path) => tokio::fs::read(path)
            .await
            .map_err(|e| OutreachError::io(path, e)),
        ProfileSource::Bytes { data, .. } => Ok(data.clone()),
    }
}

/// Decode `data` into text according to `kind`.
pub async fn extract_text(kind: DocumentKind, data: Vec<u8>) -> Result<String> {
    let text = match kind {
        DocumentKind::Json | DocumentKind::Text | DocumentKind::Markdown => String::from_utf8(data)
            .map_err(|e| OutreachError::parse(format!("document is not valid UTF-8: {e}")))?,
        // PDF decoding is CPU-bound.
        DocumentKind::Pdf => tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&data)
                .map_err(|e| OutreachError::parse(format!("failed to read PDF: {e}")))
        })
        .await
        .map_err(|e| OutreachError::parse(format!("PDF extraction task failed: {e}")))??,
    };

    debug!(?kind, chars = text.len(), "extracted document text");
    if text.trim().is_empty() {
        return Err(OutreachError::parse("document contains no text"));
    }
    Ok(text)
}
