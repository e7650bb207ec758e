//! Directory Source backed by a persisted candidate list.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, instrument};

use outreach_shared::{CandidateRecord, OutreachError, Result};

use crate::DirectorySource;
use crate::departments::matches_scope;

/// Reads `CandidateRecord`s from a JSON array on disk (for example a
/// previous run's `raw/candidates.json`).
#[derive(Debug, Clone)]
pub struct JsonDirectorySource {
    path: PathBuf,
}

impl JsonDirectorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DirectorySource for JsonDirectorySource {
    fn name(&self) -> &str {
        "json"
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn collect(
        &self,
        scopes: Option<&[String]>,
        limit: Option<usize>,
    ) -> Result<Vec<CandidateRecord>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| OutreachError::io(&self.path, e))?;
        let all: Vec<CandidateRecord> = serde_json::from_str(&content).map_err(|e| {
            OutreachError::malformed(format!("{}: {e}", self.path.display()))
        })?;

        let scopes = scopes.filter(|s| !s.is_empty());
        let mut records: Vec<CandidateRecord> = all
            .into_iter()
            .filter(|r| scopes.is_none_or(|s| s.iter().any(|scope| matches_scope(&r.department, scope))))
            .collect();

        if let Some(limit) = limit {
            records.truncate(limit);
        }

        info!(count = records.len(), "loaded candidate records");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(json: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("outreach-dir-{}.json", uuid::Uuid::now_v7()));
        std::fs::write(&path, json).unwrap();
        path
    }

    const RECORDS: &str = r#"[
        {"name": "Ada", "profile_url": "https://x/ada", "department": "CS"},
        {"name": "Nikola", "profile_url": "https://x/nikola", "department": "Electrical Engineering"},
        {"name": "Alan", "profile_url": "https://x/alan", "department": "Computer Science and Engineering",
         "research_areas": ["Computability"]}
    ]"#;

    #[tokio::test]
    async fn filters_by_scope_alias_and_limit() {
        let path = write_fixture(RECORDS);
        let source = JsonDirectorySource::new(&path);

        let cs = vec!["CS".to_string()];
        let records = source.collect(Some(&cs), None).await.unwrap();
        assert_eq!(
            records.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["Ada", "Alan"]
        );

        let records = source.collect(None, Some(2)).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "Nikola");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn malformed_file_is_reported() {
        let path = write_fixture(r#"{"not": "a list"}"#);
        let err = JsonDirectorySource::new(&path).collect(None, None).await.unwrap_err();
        assert!(matches!(err, OutreachError::MalformedOutput { .. }));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let source = JsonDirectorySource::new("/nonexistent/outreach/candidates.json");
        assert!(matches!(
            source.collect(None, None).await,
            Err(OutreachError::Io { .. })
        ));
    }
}
