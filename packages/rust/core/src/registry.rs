//! Run registry: in-flight and finished runs keyed by [`RunId`].
//!
//! The registry is an ordinary value owned by whatever hosts the pipeline.
//! Lifecycle: [`RunRegistry::create`] when a run starts,
//! [`RunRegistry::record_stage`] as stages complete, [`RunRegistry::finish`]
//! with the final report. [`RegistryProgress`] drives the last two from the
//! pipeline's progress callbacks.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use outreach_shared::{OutreachError, Result, RunId};

use crate::pipeline::ProgressReporter;
use crate::state::{PipelineState, RunMode, RunReport, RunRequest, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Finished,
}

/// What the registry knows about one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunEntry {
    pub run_id: RunId,
    pub mode: RunMode,
    pub status: RunStatus,
    /// Stage most recently started.
    pub current_stage: Stage,
    pub completed_stages: Vec<Stage>,
    pub created_at: DateTime<Utc>,
    /// Present once finished.
    pub report: Option<RunReport>,
}

#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<RunId, RunEntry>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RunId, RunEntry>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a run about to start. Fails if the id is already known.
    pub fn create(&self, request: &RunRequest) -> Result<RunId> {
        let mut runs = self.lock();
        if runs.contains_key(&request.run_id) {
            return Err(OutreachError::validation(format!(
                "run {} already registered",
                request.run_id
            )));
        }
        runs.insert(
            request.run_id,
            RunEntry {
                run_id: request.run_id,
                mode: request.mode,
                status: RunStatus::Running,
                current_stage: Stage::Start,
                completed_stages: Vec::new(),
                created_at: Utc::now(),
                report: None,
            },
        );
        debug!(run_id = %request.run_id, "run registered");
        Ok(request.run_id)
    }

    fn update(&self, run_id: RunId, f: impl FnOnce(&mut RunEntry)) -> Result<()> {
        let mut runs = self.lock();
        let entry = runs
            .get_mut(&run_id)
            .ok_or_else(|| OutreachError::validation(format!("unknown run {run_id}")))?;
        if entry.status == RunStatus::Finished {
            return Err(OutreachError::validation(format!("run {run_id} already finished")));
        }
        f(entry);
        Ok(())
    }

    pub fn stage_started(&self, run_id: RunId, stage: Stage) -> Result<()> {
        self.update(run_id, |entry| entry.current_stage = stage)
    }

    pub fn record_stage(&self, run_id: RunId, stage: Stage) -> Result<()> {
        self.update(run_id, |entry| {
            if !entry.completed_stages.contains(&stage) {
                entry.completed_stages.push(stage);
            }
        })
    }

    /// Mark a run finished. Its entry stays readable.
    pub fn finish(&self, run_id: RunId, report: RunReport) -> Result<()> {
        self.update(run_id, |entry| {
            entry.status = RunStatus::Finished;
            entry.current_stage = Stage::End;
            entry.completed_stages = report.completed_stages.clone();
            entry.report = Some(report);
        })
    }

    pub fn get(&self, run_id: RunId) -> Option<RunEntry> {
        self.lock().get(&run_id).cloned()
    }

    /// All runs, oldest first.
    pub fn list(&self) -> Vec<RunEntry> {
        let mut entries: Vec<RunEntry> = self.lock().values().cloned().collect();
        // UUID v7 ids sort by creation time.
        entries.sort_by_key(|e| e.run_id.0);
        entries
    }

    /// Drop finished runs, returning how many were removed.
    pub fn prune_finished(&self) -> usize {
        let mut runs = self.lock();
        let before = runs.len();
        runs.retain(|_, entry| entry.status == RunStatus::Running);
        before - runs.len()
    }
}

/// Progress adapter that records one run's lifecycle in a registry and
/// forwards every callback to `inner`.
pub struct RegistryProgress<'a> {
    registry: &'a RunRegistry,
    run_id: RunId,
    inner: &'a dyn ProgressReporter,
}

impl<'a> RegistryProgress<'a> {
    pub fn new(registry: &'a RunRegistry, run_id: RunId, inner: &'a dyn ProgressReporter) -> Self {
        Self {
            registry,
            run_id,
            inner,
        }
    }

    fn note(&self, result: Result<()>) {
        if let Err(e) = result {
            debug!(run_id = %self.run_id, error = %e, "registry update skipped");
        }
    }
}

impl ProgressReporter for RegistryProgress<'_> {
    fn stage_started(&self, stage: Stage) {
        self.note(self.registry.stage_started(self.run_id, stage));
        self.inner.stage_started(stage);
    }

    fn stage_completed(&self, stage: Stage) {
        self.note(self.registry.record_stage(self.run_id, stage));
        self.inner.stage_completed(stage);
    }

    fn record_enriched(&self, name: &str, current: usize, total: usize) {
        self.inner.record_enriched(name, current, total);
    }

    fn record_scored(&self, name: &str, current: usize, total: usize) {
        self.inner.record_scored(name, current, total);
    }

    fn done(&self, state: &PipelineState) {
        self.note(self.registry.finish(self.run_id, state.report()));
        self.inner.done(state);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use outreach_directory::DirectorySource;
    use outreach_enrichment::{ContextEnricher, Enrichment};
    use outreach_profile::{ProfileExtractor, ProfileSource};
    use outreach_shared::{CandidateRecord, RequesterProfile, RetryPolicy};

    use super::*;
    use crate::pipeline::{Pipeline, SilentProgress};

    #[test]
    fn lifecycle_create_record_finish() {
        let registry = RunRegistry::new();
        let request = RunRequest::new();
        let id = registry.create(&request).unwrap();
        assert!(registry.create(&request).is_err());

        registry.stage_started(id, Stage::Collect).unwrap();
        registry.record_stage(id, Stage::Collect).unwrap();
        registry.record_stage(id, Stage::Collect).unwrap();
        let entry = registry.get(id).unwrap();
        assert_eq!(entry.status, RunStatus::Running);
        assert_eq!(entry.current_stage, Stage::Collect);
        assert_eq!(entry.completed_stages, vec![Stage::Collect]);

        let mut state = PipelineState::new(
            id,
            crate::state::RunConfig {
                scopes: None,
                limit: None,
                min_score: 0.3,
                mode: RunMode::Full,
            },
        );
        state.finish();
        registry.finish(id, state.report()).unwrap();

        let entry = registry.get(id).unwrap();
        assert_eq!(entry.status, RunStatus::Finished);
        assert_eq!(entry.current_stage, Stage::End);
        assert!(entry.report.is_some());
        // Finished runs no longer accept updates.
        assert!(registry.record_stage(id, Stage::Rank).is_err());
    }

    #[test]
    fn unknown_runs_are_rejected() {
        let registry = RunRegistry::new();
        assert!(registry.record_stage(RunId::new(), Stage::Enrich).is_err());
        assert!(registry.get(RunId::new()).is_none());
    }

    #[test]
    fn list_is_oldest_first_and_prune_keeps_running() {
        let registry = RunRegistry::new();
        let first = registry.create(&RunRequest::new()).unwrap();
        let second = registry.create(&RunRequest::new()).unwrap();
        let ids: Vec<_> = registry.list().iter().map(|e| e.run_id).collect();
        assert_eq!(ids, vec![first, second]);

        let mut state = PipelineState::new(
            first,
            crate::state::RunConfig {
                scopes: None,
                limit: None,
                min_score: 0.3,
                mode: RunMode::CollectOnly,
            },
        );
        state.finish();
        registry.finish(first, state.report()).unwrap();
        assert_eq!(registry.prune_finished(), 1);
        assert!(registry.get(first).is_none());
        assert!(registry.get(second).is_some());
    }

    struct OneRecord;

    #[async_trait]
    impl DirectorySource for OneRecord {
        fn name(&self) -> &str {
            "one"
        }
        async fn collect(
            &self,
            _scopes: Option<&[String]>,
            _limit: Option<usize>,
        ) -> Result<Vec<CandidateRecord>> {
            Ok(vec![CandidateRecord {
                name: "Dr. Jane Doe".into(),
                profile_url: "https://example.edu/jane".into(),
                department: "CS".into(),
                designation: "Professor".into(),
                email: None,
                phone: None,
                personal_webpage: None,
                research_areas: vec!["Robotics".into()],
                bio: None,
            }])
        }
    }

    struct NoContext;

    #[async_trait]
    impl ContextEnricher for NoContext {
        fn name(&self) -> &str {
            "none"
        }
        async fn ensure_available(&self) -> Result<()> {
            Ok(())
        }
        async fn enrich(&self, _record: &CandidateRecord) -> Result<Enrichment> {
            Ok(Enrichment::default())
        }
    }

    struct NoProfile;

    #[async_trait]
    impl ProfileExtractor for NoProfile {
        async fn extract(&self, _source: &ProfileSource) -> Result<RequesterProfile> {
            Err(OutreachError::UnsupportedFormat {
                extension: "docx".into(),
            })
        }
    }

    #[tokio::test]
    async fn registry_progress_tracks_a_pipeline_run() {
        let pipeline = Pipeline::new(Arc::new(OneRecord), Arc::new(NoContext), Arc::new(NoProfile))
            .with_retry(RetryPolicy::immediate(1));
        let registry = RunRegistry::new();
        let request = RunRequest::new().with_mode(RunMode::CollectOnly);
        let id = registry.create(&request).unwrap();

        let progress = RegistryProgress::new(&registry, id, &SilentProgress);
        let state = pipeline.run(request, &progress).await;

        let entry = registry.get(id).unwrap();
        assert_eq!(entry.status, RunStatus::Finished);
        assert_eq!(entry.completed_stages, vec![Stage::Collect]);
        let report = entry.report.unwrap();
        assert_eq!(report.candidates, 1);
        assert_eq!(report, state.report());
    }
}
