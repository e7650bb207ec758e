//! Profile Extractor adapters: requester profiles from uploaded documents.
//!
//! This crate provides:
//! - [`ProfileSource`], a document on disk or an in-memory upload
//! - [`ProfileExtractor`], the adapter trait the extract-profile stage calls
//! - [`DocumentProfileExtractor`], JSON / text / Markdown / PDF extraction with
//!   optional model-assisted structuring
//! - [`normalize_skill`], canonical names for common skill abbreviations

pub mod cv;
pub mod document;
pub mod extractor;
pub mod sections;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use outreach_shared::{RequesterProfile, Result};

pub use cv::{CvDocument, normalize_skill, parse_profile_json};
pub use document::DocumentKind;
pub use extractor::DocumentProfileExtractor;
pub use sections::parse_sections;

/// Where a requester profile document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSource {
    /// A file on disk; the extension selects the format.
    Path(PathBuf),
    /// Raw bytes plus the original filename as a format hint.
    Bytes { data: Vec<u8>, filename: String },
}

impl ProfileSource {
    /// The filename (or path) whose extension decides the format.
    pub fn filename_hint(&self) -> &str {
        match self {
            Self::Path(path) => path.to_str().unwrap_or_default(),
            Self::Bytes { filename, .. } => filename,
        }
    }

    /// Lowercased extension of the filename hint, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(self.filename_hint())
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }
}

impl From<PathBuf> for ProfileSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

/// Produces a structured [`RequesterProfile`] from a document.
#[async_trait]
pub trait ProfileExtractor: Send + Sync {
    /// Fails with `UnsupportedFormat` for unrecognized extensions, `Parse`
    /// when the document cannot be read, and `MalformedOutput` when the
    /// result does not validate.
    async fn extract(&self, source: &ProfileSource) -> Result<RequesterProfile>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_comes_from_either_variant() {
        let path = ProfileSource::Path(PathBuf::from("/tmp/Resume.PDF"));
        assert_eq!(path.extension().as_deref(), Some("pdf"));

        let bytes = ProfileSource::Bytes {
            data: vec![],
            filename: "cv.md".into(),
        };
        assert_eq!(bytes.extension().as_deref(), Some("md"));

        let bare = ProfileSource::Bytes {
            data: vec![],
            filename: "README".into(),
        };
        assert_eq!(bare.extension(), None);
    }
}
