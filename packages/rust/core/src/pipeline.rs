//! Pipeline Orchestrator: start → collect → enrich → {rank | end}, with
//! extract-profile on an independent side path.
//!
//! No stage failure is fatal. Each stage function returns a [`StageUpdate`]
//! even when its adapter fails, and [`Pipeline::run`] always returns a
//! finished [`PipelineState`]. Callers read [`PipelineState::errors`] to tell
//! a clean run from a degraded one.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use outreach_directory::DirectorySource;
use outreach_enrichment::ContextEnricher;
use outreach_profile::{ProfileExtractor, ProfileSource};
use outreach_shared::{
    CandidateRecord, EnrichedRecord, OutreachError, RankedOutput, RequesterProfile, RetryPolicy,
};

use crate::scope::{ScopeOptions, derive_scopes};
use crate::scoring::RelevanceEngine;
use crate::state::{PipelineState, RunConfig, RunMode, RunRequest, Stage, StageUpdate};

/// Default number of records enriched at once.
pub const DEFAULT_ENRICH_CONCURRENCY: usize = 3;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage begins.
    fn stage_started(&self, stage: Stage);
    /// Called when a stage's update is merged as completed.
    fn stage_completed(&self, stage: Stage);
    /// Called after each record's enrichment, successful or degraded.
    fn record_enriched(&self, name: &str, current: usize, total: usize);
    /// Called after each record is scored.
    fn record_scored(&self, name: &str, current: usize, total: usize);
    /// Called once the run reached `end`.
    fn done(&self, state: &PipelineState);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_completed(&self, _stage: Stage) {}
    fn record_enriched(&self, _name: &str, _current: usize, _total: usize) {}
    fn record_scored(&self, _name: &str, _current: usize, _total: usize) {}
    fn done(&self, _state: &PipelineState) {}
}

/// The orchestrator and its adapters.
#[derive(Clone)]
pub struct Pipeline {
    directory: Arc<dyn DirectorySource>,
    enricher: Arc<dyn ContextEnricher>,
    extractor: Arc<dyn ProfileExtractor>,
    engine: RelevanceEngine,
    retry: RetryPolicy,
    enrich_concurrency: usize,
    scope_options: ScopeOptions,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("directory", &self.directory.name())
            .field("enricher", &self.enricher.name())
            .field("engine", &self.engine)
            .field("retry", &self.retry)
            .field("enrich_concurrency", &self.enrich_concurrency)
            .field("scope_options", &self.scope_options)
            .finish()
    }
}

impl Pipeline {
    pub fn new(
        directory: Arc<dyn DirectorySource>,
        enricher: Arc<dyn ContextEnricher>,
        extractor: Arc<dyn ProfileExtractor>,
    ) -> Self {
        Self {
            directory,
            enricher,
            extractor,
            engine: RelevanceEngine::default(),
            retry: RetryPolicy::default(),
            enrich_concurrency: DEFAULT_ENRICH_CONCURRENCY,
            scope_options: ScopeOptions::default(),
        }
    }

    pub fn with_engine(mut self, engine: RelevanceEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Retry policy wrapped around every directory and enricher call.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_enrich_concurrency(mut self, n: usize) -> Self {
        self.enrich_concurrency = n.max(1);
        self
    }

    pub fn with_scope_options(mut self, options: ScopeOptions) -> Self {
        self.scope_options = options;
        self
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Execute one run. Never fails; errors are collected in the state.
    #[instrument(skip_all, fields(run_id = %request.run_id, mode = %request.mode))]
    pub async fn run(&self, request: RunRequest, progress: &dyn ProgressReporter) -> PipelineState {
        let RunRequest {
            run_id,
            profile: source,
            scopes,
            limit,
            min_score,
            mode,
        } = request;
        let mut state = PipelineState::new(
            run_id,
            RunConfig {
                scopes,
                limit,
                min_score,
                mode,
            },
        );
        info!(%run_id, %mode, "starting pipeline run");
        progress.stage_started(Stage::Start);

        match mode {
            RunMode::ProfileOnly => match &source {
                Some(source) => {
                    let update = self.extract_profile(source, progress).await;
                    merge(&mut state, update, progress);
                }
                None => {
                    warn!("profile-only run without a profile source");
                    state.apply(StageUpdate::error(
                        "extract-profile: no profile source given for a profile-only run",
                    ));
                }
            },
            RunMode::CollectOnly => {
                let scopes = state.config().scopes.clone();
                let update = self.collect(scopes.as_deref(), limit, progress).await;
                merge(&mut state, update, progress);
            }
            RunMode::Full => {
                self.run_full(&mut state, source.as_ref(), progress).await;
            }
        }

        self.end(&mut state, progress);
        state
    }

    /// Rank saved enriched records against a profile without collecting.
    ///
    /// The inputs are loaded data, not stage results, so only `rank`
    /// appears among the completed stages.
    #[instrument(skip_all, fields(records = enriched.len()))]
    pub async fn rank_only(
        &self,
        profile: RequesterProfile,
        enriched: Vec<EnrichedRecord>,
        min_score: f32,
        progress: &dyn ProgressReporter,
    ) -> PipelineState {
        let request = RunRequest::new().with_min_score(min_score);
        let mut state = PipelineState::new(
            request.run_id,
            RunConfig {
                scopes: None,
                limit: None,
                min_score: request.min_score,
                mode: RunMode::Full,
            },
        );
        progress.stage_started(Stage::Start);
        state.apply(StageUpdate {
            profile: Some(profile),
            enriched: Some(enriched),
            ..Default::default()
        });
        self.branch(&mut state, progress).await;
        self.end(&mut state, progress);
        state
    }

    async fn run_full(
        &self,
        state: &mut PipelineState,
        source: Option<&ProfileSource>,
        progress: &dyn ProgressReporter,
    ) {
        let limit = state.config().limit;

        match (source, state.config().scopes.is_some()) {
            // Auto-scoping needs the profile before collection starts.
            (Some(source), false) => {
                let update = self.extract_profile(source, progress).await;
                merge(state, update, progress);
                if let Some(profile) = state.profile() {
                    let update = self.auto_scope(profile);
                    state.apply(update);
                }

                let scopes = state.config().scopes.clone();
                let update = self.collect(scopes.as_deref(), limit, progress).await;
                merge(state, update, progress);

                let update = self.enrich(state.candidates(), progress).await;
                merge(state, update, progress);
            }
            (source, _) => {
                if source.is_none() {
                    info!("no profile source, ranking will be skipped");
                    state.apply(StageUpdate::log("no profile source given"));
                }
                let scopes = state.config().scopes.clone();

                let profile_side = async {
                    match source {
                        Some(source) => Some(self.extract_profile(source, progress).await),
                        None => None,
                    }
                };
                let records_side = async {
                    let collected = self.collect(scopes.as_deref(), limit, progress).await;
                    let records = collected.candidates.as_deref().unwrap_or_default();
                    let enriched = self.enrich(records, progress).await;
                    (collected, enriched)
                };
                let (profile_update, (collected, enriched)) =
                    tokio::join!(profile_side, records_side);

                if let Some(update) = profile_update {
                    merge(state, update, progress);
                }
                merge(state, collected, progress);
                merge(state, enriched, progress);
            }
        }

        self.branch(state, progress).await;
    }

    /// Rank when a profile and records exist, otherwise skip without error.
    async fn branch(&self, state: &mut PipelineState, progress: &dyn ProgressReporter) {
        let has_records = !state.enriched().is_empty();

        match (state.profile(), has_records) {
            (Some(profile), true) => {
                let min_score = state.config().min_score;
                let update = self.rank(profile, state.enriched(), min_score, progress).await;
                merge(state, update, progress);
            }
            (profile, has_records) => {
                let has_profile = profile.is_some();
                info!(has_profile, has_records, "skipping rank");
                state.apply(StageUpdate::log(format!(
                    "rank skipped (profile: {has_profile}, records: {has_records})"
                )));
            }
        }
    }

    fn end(&self, state: &mut PipelineState, progress: &dyn ProgressReporter) {
        state.finish();
        info!(
            run_id = %state.run_id(),
            candidates = state.candidates().len(),
            enriched = state.enriched().len(),
            ranked = state.ranked().len(),
            errors = state.errors().len(),
            "pipeline run finished"
        );
        progress.done(state);
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    /// Scope filters derived from the profile's keywords.
    pub fn auto_scope(&self, profile: &RequesterProfile) -> StageUpdate {
        let scopes = derive_scopes(profile, &self.scope_options);
        info!(?scopes, "auto-scoped from profile");
        StageUpdate {
            logs: vec![format!("auto-scoped to {}", scopes.join(", "))],
            scopes: Some(scopes),
            ..Default::default()
        }
    }

    /// Collect candidate records through the retry wrapper. On failure the
    /// update carries an empty list and exactly one error.
    #[instrument(skip_all, fields(source = self.directory.name(), limit = ?limit))]
    pub async fn collect(
        &self,
        scopes: Option<&[String]>,
        limit: Option<usize>,
        progress: &dyn ProgressReporter,
    ) -> StageUpdate {
        progress.stage_started(Stage::Collect);
        let result = self
            .retry
            .call("collect", || self.directory.collect(scopes, limit))
            .await;

        let records = match result {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "collection failed");
                return StageUpdate {
                    candidates: Some(Vec::new()),
                    ..StageUpdate::error(format!("collect: {e}"))
                };
            }
        };

        let mut update = StageUpdate::completed(Stage::Collect);
        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            match record.validate() {
                Ok(()) => kept.push(record),
                Err(e) => {
                    warn!(error = %e, "dropping invalid candidate record");
                    update.errors.push(format!("collect: {e}"));
                }
            }
        }
        if let Some(limit) = limit {
            kept.truncate(limit);
        }

        info!(count = kept.len(), "collected candidate records");
        update.logs.push(format!("collected {} candidate records", kept.len()));
        update.candidates = Some(kept);
        update
    }

    /// Enrich every record with bounded concurrency. A failing record
    /// degrades; only an unavailable enricher is an error.
    #[instrument(skip_all, fields(enricher = self.enricher.name(), records = records.len()))]
    pub async fn enrich(
        &self,
        records: &[CandidateRecord],
        progress: &dyn ProgressReporter,
    ) -> StageUpdate {
        progress.stage_started(Stage::Enrich);
        if records.is_empty() {
            info!("no records to enrich");
            return StageUpdate {
                enriched: Some(Vec::new()),
                ..StageUpdate::completed(Stage::Enrich).with_log("no records to enrich")
            };
        }

        if let Err(e) = self.enricher.ensure_available().await {
            warn!(error = %e, "enricher unavailable, degrading all records");
            return StageUpdate {
                enriched: Some(records.iter().cloned().map(EnrichedRecord::degraded).collect()),
                ..StageUpdate::error(format!("enrich: {} unavailable: {e}", self.enricher.name()))
            };
        }

        let semaphore = Arc::new(Semaphore::new(self.enrich_concurrency));
        let mut handles = Vec::with_capacity(records.len());
        for record in records {
            let enricher = Arc::clone(&self.enricher);
            let sem = semaphore.clone();
            let retry = self.retry;
            let record = record.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| OutreachError::unavailable(format!("worker pool closed: {e}")))?;
                retry.call("enrich", || enricher.enrich(&record)).await
            }));
        }

        let total = records.len();
        let mut enriched = Vec::with_capacity(total);
        let mut degraded = 0usize;
        let mut last_error: Option<OutreachError> = None;
        for (i, (record, handle)) in records.iter().zip(handles).enumerate() {
            let outcome = handle.await.unwrap_or_else(|e| {
                Err(OutreachError::unavailable(format!("enrichment task failed: {e}")))
            });
            let result = match outcome {
                Ok(enrichment) => enrichment.apply(record.clone()),
                Err(e) => {
                    warn!(candidate = %record.name, error = %e, "enrichment failed, keeping degraded record");
                    degraded += 1;
                    if !matches!(last_error, Some(OutreachError::Config { .. })) {
                        last_error = Some(e);
                    }
                    EnrichedRecord::degraded(record.clone())
                }
            };
            debug!(candidate = %record.name, confidence = result.confidence, "enriched");
            progress.record_enriched(&record.name, i + 1, total);
            enriched.push(result);
        }

        // Every record failing, or a rejected configuration, means the
        // enricher is unusable even though it reported itself available.
        let unusable =
            degraded == total || matches!(last_error, Some(OutreachError::Config { .. }));
        if let (true, Some(e)) = (unusable, last_error) {
            warn!(total, degraded, error = %e, "enricher unusable");
            return StageUpdate {
                enriched: Some(enriched),
                ..StageUpdate::error(format!("enrich: {} unavailable: {e}", self.enricher.name()))
            };
        }

        info!(total, degraded, "enrichment complete");
        StageUpdate {
            enriched: Some(enriched),
            ..StageUpdate::completed(Stage::Enrich)
                .with_log(format!("enriched {total} records ({degraded} degraded)"))
        }
    }

    /// Extract the requester profile. On failure the profile stays unset.
    #[instrument(skip_all, fields(source = source.filename_hint()))]
    pub async fn extract_profile(
        &self,
        source: &ProfileSource,
        progress: &dyn ProgressReporter,
    ) -> StageUpdate {
        progress.stage_started(Stage::ExtractProfile);
        match self.extractor.extract(source).await {
            Ok(profile) => {
                info!(name = %profile.name, "profile extracted");
                let log = format!("extracted profile for {}", profile.name);
                StageUpdate {
                    profile: Some(profile),
                    ..StageUpdate::completed(Stage::ExtractProfile).with_log(log)
                }
            }
            Err(e) => {
                warn!(error = %e, "profile extraction failed");
                StageUpdate::error(format!("extract-profile: {e}"))
            }
        }
    }

    /// Score every record, drop those under `min_score`, sort descending.
    /// Each neutral fallback adds one error naming the candidate.
    #[instrument(skip_all, fields(records = records.len(), min_score = min_score))]
    pub async fn rank(
        &self,
        profile: &RequesterProfile,
        records: &[EnrichedRecord],
        min_score: f32,
        progress: &dyn ProgressReporter,
    ) -> StageUpdate {
        progress.stage_started(Stage::Rank);
        let total = records.len();
        let mut update = StageUpdate::completed(Stage::Rank);
        let mut outputs = Vec::with_capacity(total);

        for (i, record) in records.iter().enumerate() {
            let scored = self.engine.score(profile, record).await;
            if let Some(e) = scored.failure {
                update
                    .errors
                    .push(format!("rank: scoring '{}' fell back to neutral: {e}", record.name()));
            }
            progress.record_scored(record.name(), i + 1, total);
            outputs.push(scored.output);
        }

        let ranked = filter_and_sort(outputs, min_score);
        if ranked.len() < total {
            info!(kept = ranked.len(), total, "outputs below threshold dropped");
        }
        update
            .logs
            .push(format!("ranked {} of {total} candidates (min score {min_score})", ranked.len()));
        update.ranked = Some(ranked);
        update
    }
}

/// Merge a stage update and report its completion.
fn merge(state: &mut PipelineState, update: StageUpdate, progress: &dyn ProgressReporter) {
    let completed = update.completed;
    state.apply(update);
    if let Some(stage) = completed {
        progress.stage_completed(stage);
    }
}

/// Keep outputs scoring at least `min_score`, highest first. Equal scores
/// keep their input order.
pub fn filter_and_sort(outputs: Vec<RankedOutput>, min_score: f32) -> Vec<RankedOutput> {
    let mut kept: Vec<RankedOutput> = outputs
        .into_iter()
        .filter(|o| o.overall_score >= min_score)
        .collect();
    kept.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score));
    kept
}
