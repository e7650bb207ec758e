//! Directory Source adapters: where candidate records come from.
//!
//! This crate provides:
//! - [`DirectorySource`], the adapter trait the pipeline collects through
//! - [`HttpDirectorySource`], a scraper for department faculty listings
//! - [`JsonDirectorySource`], a reader for previously persisted candidate lists
//! - [`departments`], the department name/alias → code table used for scoping

pub mod departments;
pub mod http;
pub mod json;
pub mod parse;

use async_trait::async_trait;

use outreach_shared::{CandidateRecord, Result};

pub use departments::{DEPARTMENT_CODES, department_code, department_name};
pub use http::HttpDirectorySource;
pub use json::JsonDirectorySource;

/// Returns raw candidate records for a set of scope filters.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Collect candidate records.
    ///
    /// `scopes` are department codes or names; `None` (or an empty slice)
    /// means the whole directory. `limit` caps the number of returned records.
    async fn collect(
        &self,
        scopes: Option<&[String]>,
        limit: Option<usize>,
    ) -> Result<Vec<CandidateRecord>>;
}
