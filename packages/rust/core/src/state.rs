//! Pipeline state: run configuration, stage names and the aggregate a run
//! produces.
//!
//! [`PipelineState`] is owned by the orchestrator. Stages never touch it
//! directly; they return a [`StageUpdate`] which the orchestrator merges with
//! [`PipelineState::apply`]. Errors, logs and completed stages only grow.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use outreach_profile::ProfileSource;
use outreach_shared::{
    CandidateRecord, EnrichedRecord, OutreachError, RankedOutput, RequesterProfile, Result, RunId,
};

/// Minimum overall score used when none is configured.
pub const DEFAULT_MIN_SCORE: f32 = 0.3;

// ---------------------------------------------------------------------------
// RunMode / Stage
// ---------------------------------------------------------------------------

/// Which parts of the pipeline a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Profile extraction, collection, enrichment and ranking.
    #[default]
    Full,
    /// Collection only.
    CollectOnly,
    /// Profile extraction only.
    ProfileOnly,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::CollectOnly => "collect-only",
            Self::ProfileOnly => "profile-only",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = OutreachError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "full" => Ok(Self::Full),
            "collect-only" | "collect" => Ok(Self::CollectOnly),
            "profile-only" | "profile" => Ok(Self::ProfileOnly),
            other => Err(OutreachError::validation(format!(
                "unknown run mode '{other}' (expected full, collect-only or profile-only)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Start,
    Collect,
    Enrich,
    ExtractProfile,
    Rank,
    End,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Collect => "collect",
            Self::Enrich => "enrich",
            Self::ExtractProfile => "extract-profile",
            Self::Rank => "rank",
            Self::End => "end",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RunRequest / RunConfig
// ---------------------------------------------------------------------------

/// Pipeline entry point arguments.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub run_id: RunId,
    pub profile: Option<ProfileSource>,
    /// Explicit scope filters. `None` lets a profile choose them.
    pub scopes: Option<Vec<String>>,
    pub limit: Option<usize>,
    pub min_score: f32,
    pub mode: RunMode,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            run_id: RunId::new(),
            profile: None,
            scopes: None,
            limit: None,
            min_score: DEFAULT_MIN_SCORE,
            mode: RunMode::Full,
        }
    }
}

impl RunRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_profile(mut self, source: impl Into<ProfileSource>) -> Self {
        self.profile = Some(source.into());
        self
    }

    /// Blank entries are dropped; an empty list means "no explicit scopes".
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scopes: Vec<String> = scopes
            .into_iter()
            .map(Into::into)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self.scopes = (!scopes.is_empty()).then_some(scopes);
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Clamped to `[0, 1]`; NaN keeps the default.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = if min_score.is_nan() {
            DEFAULT_MIN_SCORE
        } else {
            min_score.clamp(0.0, 1.0)
        };
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }
}

/// The configuration part of a [`PipelineState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub scopes: Option<Vec<String>>,
    pub limit: Option<usize>,
    pub min_score: f32,
    pub mode: RunMode,
}

// ---------------------------------------------------------------------------
// StageUpdate
// ---------------------------------------------------------------------------

/// Partial state returned by a stage function. `None` fields leave the
/// state untouched.
#[derive(Debug, Default)]
pub struct StageUpdate {
    pub candidates: Option<Vec<CandidateRecord>>,
    pub enriched: Option<Vec<EnrichedRecord>>,
    pub ranked: Option<Vec<RankedOutput>>,
    pub profile: Option<RequesterProfile>,
    /// Scope filters chosen by auto-scoping.
    pub scopes: Option<Vec<String>>,
    pub errors: Vec<String>,
    pub logs: Vec<String>,
    /// Set when the stage succeeded.
    pub completed: Option<Stage>,
}

impl StageUpdate {
    pub fn completed(stage: Stage) -> Self {
        Self {
            completed: Some(stage),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            ..Default::default()
        }
    }

    pub fn log(message: impl Into<String>) -> Self {
        Self {
            logs: vec![message.into()],
            ..Default::default()
        }
    }

    pub fn with_log(mut self, message: impl Into<String>) -> Self {
        self.logs.push(message.into());
        self
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PipelineState {
    run_id: RunId,
    config: RunConfig,
    stage: Stage,
    candidates: Vec<CandidateRecord>,
    enriched: Vec<EnrichedRecord>,
    ranked: Vec<RankedOutput>,
    profile: Option<RequesterProfile>,
    errors: Vec<String>,
    logs: Vec<String>,
    completed: Vec<Stage>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl PipelineState {
    pub fn new(run_id: RunId, config: RunConfig) -> Self {
        Self {
            run_id,
            config,
            stage: Stage::Start,
            candidates: Vec::new(),
            enriched: Vec::new(),
            ranked: Vec::new(),
            profile: None,
            errors: Vec::new(),
            logs: Vec::new(),
            completed: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Current stage; [`Stage::End`] once the run finished.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn candidates(&self) -> &[CandidateRecord] {
        &self.candidates
    }

    pub fn enriched(&self) -> &[EnrichedRecord] {
        &self.enriched
    }

    pub fn ranked(&self) -> &[RankedOutput] {
        &self.ranked
    }

    pub fn profile(&self) -> Option<&RequesterProfile> {
        self.profile.as_ref()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn completed_stages(&self) -> &[Stage] {
        &self.completed
    }

    pub fn has_completed(&self, stage: Stage) -> bool {
        self.completed.contains(&stage)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::End
    }

    /// Merge a stage's update. Ignored once the run has ended.
    pub fn apply(&mut self, update: StageUpdate) {
        if self.is_finished() {
            warn!(run_id = %self.run_id, "update after end ignored");
            return;
        }
        if let Some(candidates) = update.candidates {
            self.candidates = candidates;
        }
        if let Some(enriched) = update.enriched {
            self.enriched = enriched;
        }
        if let Some(ranked) = update.ranked {
            self.ranked = ranked;
        }
        if let Some(profile) = update.profile {
            self.profile = Some(profile);
        }
        if let Some(scopes) = update.scopes {
            self.config.scopes = Some(scopes);
        }
        self.errors.extend(update.errors);
        self.logs.extend(update.logs);
        if let Some(stage) = update.completed {
            self.stage = stage;
            if !self.completed.contains(&stage) {
                self.completed.push(stage);
            }
        }
    }

    /// Enter the terminal stage.
    pub fn finish(&mut self) {
        if self.is_finished() {
            return;
        }
        self.stage = Stage::End;
        self.finished_at = Some(Utc::now());
    }

    /// Counts, stages and errors of the run.
    pub fn report(&self) -> RunReport {
        RunReport {
            run_id: self.run_id,
            mode: self.config.mode,
            scopes: self.config.scopes.clone(),
            candidates: self.candidates.len(),
            enriched: self.enriched.len(),
            ranked: self.ranked.len(),
            has_profile: self.profile.is_some(),
            completed_stages: self.completed.clone(),
            errors: self.errors.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Snapshot of a run for callers that do not need the records themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub mode: RunMode,
    pub scopes: Option<Vec<String>>,
    pub candidates: usize,
    pub enriched: usize,
    pub ranked: usize,
    pub has_profile: bool,
    pub completed_stages: Vec<Stage>,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> PipelineState {
        PipelineState::new(
            RunId::new(),
            RunConfig {
                scopes: None,
                limit: None,
                min_score: DEFAULT_MIN_SCORE,
                mode: RunMode::Full,
            },
        )
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("collect-only".parse::<RunMode>().unwrap(), RunMode::CollectOnly);
        assert_eq!("Profile_Only".parse::<RunMode>().unwrap(), RunMode::ProfileOnly);
        assert_eq!(RunMode::Full.to_string(), "full");
        assert!("everything".parse::<RunMode>().is_err());
    }

    #[test]
    fn stage_names_serialize_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Stage::ExtractProfile).unwrap(),
            "\"extract-profile\""
        );
        assert_eq!(Stage::Rank.as_str(), "rank");
    }

    #[test]
    fn request_builder_normalizes_inputs() {
        let request = RunRequest::new()
            .with_scopes([" CS ", "", "EE"])
            .with_min_score(4.0);
        assert_eq!(request.scopes, Some(vec!["CS".to_string(), "EE".to_string()]));
        assert_eq!(request.min_score, 1.0);

        let request = RunRequest::new().with_scopes(Vec::<String>::new()).with_min_score(f32::NAN);
        assert!(request.scopes.is_none());
        assert_eq!(request.min_score, DEFAULT_MIN_SCORE);
    }

    #[test]
    fn errors_and_logs_only_grow() {
        let mut state = state();
        state.apply(StageUpdate::error("collect: down"));
        state.apply(StageUpdate::log("first"));
        state.apply(StageUpdate::error("enrich: down").with_log("second"));
        assert_eq!(state.errors(), ["collect: down", "enrich: down"]);
        assert_eq!(state.logs(), ["first", "second"]);
    }

    #[test]
    fn completed_stages_are_recorded_once_in_order() {
        let mut state = state();
        state.apply(StageUpdate::completed(Stage::ExtractProfile));
        state.apply(StageUpdate::completed(Stage::Collect));
        state.apply(StageUpdate::completed(Stage::Collect));
        assert_eq!(state.completed_stages(), [Stage::ExtractProfile, Stage::Collect]);
        assert_eq!(state.stage(), Stage::Collect);
    }

    #[test]
    fn no_mutation_after_end() {
        let mut state = state();
        state.apply(StageUpdate::error("collect: down"));
        state.finish();
        let finished_at = state.finished_at();
        assert!(finished_at.is_some());

        state.apply(StageUpdate::error("late"));
        state.apply(StageUpdate::completed(Stage::Rank));
        state.finish();
        assert_eq!(state.errors().len(), 1);
        assert!(!state.has_completed(Stage::Rank));
        assert_eq!(state.stage(), Stage::End);
        assert_eq!(state.finished_at(), finished_at);
    }

    #[test]
    fn auto_scopes_land_in_config() {
        let mut state = state();
        state.apply(StageUpdate {
            scopes: Some(vec!["ME".into()]),
            ..Default::default()
        });
        assert_eq!(state.config().scopes, Some(vec!["ME".to_string()]));

        let report = state.report();
        assert_eq!(report.scopes, Some(vec!["ME".to_string()]));
        assert!(report.is_clean());
        assert!(!report.has_profile);
    }
}
