//! Run artifact persistence.
//!
//! Writes the JSON documents a pipeline run produces, plus one Markdown file
//! per ranked output, under a single output directory:
//!
//! ```text
//! <root>/
//! ├── raw/candidates.json
//! ├── enriched/enriched_records.json
//! └── outputs/
//!     ├── ranked_outputs.json
//!     ├── run_summary.json
//!     └── messages/01-jane-doe.md ...
//! ```
//!
//! Every file is written to a temporary sibling first and renamed into
//! place, so readers never observe a partially written artifact.

pub mod markdown;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use outreach_shared::{
    CandidateRecord, EnrichedRecord, OutreachError, RankedOutput, Result, RunId,
};

pub const CANDIDATES_FILE: &str = "raw/candidates.json";
pub const ENRICHED_FILE: &str = "enriched/enriched_records.json";
pub const RANKED_FILE: &str = "outputs/ranked_outputs.json";
pub const SUMMARY_FILE: &str = "outputs/run_summary.json";
pub const MESSAGES_DIR: &str = "outputs/messages";

/// Metadata for one written artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Path relative to the store root.
    pub path: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Record counts of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub candidates: usize,
    pub enriched: usize,
    pub ranked: usize,
}

/// `outputs/run_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counts: RunCounts,
    pub completed_stages: Vec<String>,
    pub errors: Vec<String>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactMeta>,
}

/// Output directory for one run's artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write_candidates(&self, records: &[CandidateRecord]) -> Result<ArtifactMeta> {
        self.write_json(CANDIDATES_FILE, records)
    }

    pub fn write_enriched(&self, records: &[EnrichedRecord]) -> Result<ArtifactMeta> {
        self.write_json(ENRICHED_FILE, records)
    }

    pub fn write_ranked(&self, outputs: &[RankedOutput]) -> Result<ArtifactMeta> {
        self.write_json(RANKED_FILE, outputs)
    }

    /// One Markdown file per output, numbered by rank (1-based).
    #[instrument(skip_all, fields(count = outputs.len()))]
    pub fn write_messages(&self, outputs: &[RankedOutput]) -> Result<Vec<ArtifactMeta>> {
        outputs
            .iter()
            .enumerate()
            .map(|(i, output)| {
                let rank = i + 1;
                let rel = format!(
                    "{MESSAGES_DIR}/{}.md",
                    markdown::file_stem(rank, &output.candidate_name)
                );
                self.write_atomic(&rel, markdown::render_output(rank, output).as_bytes())
            })
            .collect()
    }

    /// Write the summary. Its own checksum is not part of `artifacts`.
    pub fn write_summary(&self, summary: &RunSummary) -> Result<ArtifactMeta> {
        let meta = self.write_json(SUMMARY_FILE, summary)?;
        info!(
            run_id = %summary.run_id,
            artifacts = summary.artifacts.len(),
            errors = summary.errors.len(),
            path = %self.root.display(),
            "run artifacts written"
        );
        Ok(meta)
    }

    pub fn load_candidates(path: &Path) -> Result<Vec<CandidateRecord>> {
        load_json(path)
    }

    pub fn load_enriched(path: &Path) -> Result<Vec<EnrichedRecord>> {
        load_json(path)
    }

    pub fn load_ranked(path: &Path) -> Result<Vec<RankedOutput>> {
        load_json(path)
    }

    pub fn load_summary(path: &Path) -> Result<RunSummary> {
        load_json(path)
    }

    fn write_json<T: Serialize + ?Sized>(&self, rel: &str, data: &T) -> Result<ArtifactMeta> {
        let json = serde_json::to_string_pretty(data)
            .map_err(|e| OutreachError::validation(format!("JSON serialization failed: {e}")))?;
        self.write_atomic(rel, json.as_bytes())
    }

    fn write_atomic(&self, rel: &str, content: &[u8]) -> Result<ArtifactMeta> {
        let target = self.root.join(rel);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| OutreachError::io(parent, e))?;
        }

        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("artifact");
        let temp = target.with_file_name(format!(".{file_name}.tmp"));

        std::fs::write(&temp, content).map_err(|e| OutreachError::io(&temp, e))?;
        std::fs::rename(&temp, &target).map_err(|e| OutreachError::io(&target, e))?;

        let mut hasher = Sha256::new();
        hasher.update(content);
        let sha256 = format!("{:x}", hasher.finalize());

        debug!(path = %target.display(), size = content.len(), "wrote artifact");
        Ok(ArtifactMeta {
            path: rel.to_string(),
            sha256,
            size_bytes: content.len(),
        })
    }
}

/// Read a JSON artifact back.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| OutreachError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| OutreachError::malformed(format!("{}: {e}", path.display())))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_shared::{GenerationMeta, OutreachMessage};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("outreach-artifacts-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn candidate(name: &str) -> CandidateRecord {
        CandidateRecord {
            name: name.into(),
            profile_url: format!("https://example.edu/{name}"),
            department: "CS".into(),
            designation: "Professor".into(),
            email: None,
            phone: None,
            personal_webpage: None,
            research_areas: vec!["Graphs".into()],
            bio: None,
        }
    }

    fn ranked(name: &str, score: f32) -> RankedOutput {
        RankedOutput {
            candidate_name: name.into(),
            profile_url: format!("https://example.edu/{name}"),
            department: "CS".into(),
            candidate_email: None,
            annotations: vec![],
            overall_score: score,
            message: OutreachMessage {
                subject: "Hello".into(),
                body: "Body".into(),
            },
            document: "Letter".into(),
            meta: GenerationMeta {
                generated_at: Utc::now(),
                generator: "template".into(),
                analyzer: "keyword".into(),
                fallback: false,
            },
        }
    }

    #[test]
    fn json_artifacts_roundtrip() {
        let dir = temp_dir();
        let store = ArtifactStore::new(&dir);

        let records = vec![candidate("ada"), candidate("alan")];
        let meta = store.write_candidates(&records).unwrap();
        assert_eq!(meta.path, CANDIDATES_FILE);
        assert_eq!(meta.sha256.len(), 64);

        let enriched: Vec<EnrichedRecord> =
            records.iter().cloned().map(EnrichedRecord::degraded).collect();
        store.write_enriched(&enriched).unwrap();
        store.write_ranked(&[ranked("ada", 0.9)]).unwrap();

        assert_eq!(ArtifactStore::load_candidates(&dir.join(CANDIDATES_FILE)).unwrap(), records);
        assert_eq!(ArtifactStore::load_enriched(&dir.join(ENRICHED_FILE)).unwrap(), enriched);
        assert_eq!(ArtifactStore::load_ranked(&dir.join(RANKED_FILE)).unwrap().len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn output_is_pretty_utf8() {
        let dir = temp_dir();
        let store = ArtifactStore::new(&dir);
        let mut record = candidate("ada");
        record.name = "Ádá Lövelace".into();
        store.write_candidates(&[record]).unwrap();

        let text = std::fs::read_to_string(dir.join(CANDIDATES_FILE)).unwrap();
        assert!(text.contains("\n  {"));
        assert!(text.contains("Ádá Lövelace"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn checksum_matches_content_and_no_temp_files_remain() {
        let dir = temp_dir();
        let store = ArtifactStore::new(&dir);
        let meta = store.write_ranked(&[]).unwrap();

        let bytes = std::fs::read(dir.join(RANKED_FILE)).unwrap();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        assert_eq!(meta.sha256, format!("{:x}", hasher.finalize()));
        assert_eq!(meta.size_bytes, bytes.len());

        let leftovers: Vec<_> = std::fs::read_dir(dir.join("outputs"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn messages_and_summary() {
        let dir = temp_dir();
        let store = ArtifactStore::new(&dir);
        let outputs = vec![ranked("Jane Doe", 0.8), ranked("Alan Turing", 0.5)];
        let metas = store.write_messages(&outputs).unwrap();
        assert_eq!(metas[0].path, "outputs/messages/01-jane-doe.md");
        assert_eq!(metas[1].path, "outputs/messages/02-alan-turing.md");
        assert!(dir.join(&metas[1].path).exists());

        let summary = RunSummary {
            run_id: RunId::new(),
            mode: "full".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            counts: RunCounts {
                candidates: 2,
                enriched: 2,
                ranked: 2,
            },
            completed_stages: vec!["collect".into(), "enrich".into(), "rank".into()],
            errors: vec![],
            artifacts: metas,
        };
        store.write_summary(&summary).unwrap();
        let back = ArtifactStore::load_summary(&dir.join(SUMMARY_FILE)).unwrap();
        assert_eq!(back, summary);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn loading_bad_json_is_malformed() {
        let dir = temp_dir();
        let path = dir.join("bad.json");
        std::fs::write(&path, "[{").unwrap();
        assert!(matches!(
            ArtifactStore::load_enriched(&path),
            Err(OutreachError::MalformedOutput { .. })
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
