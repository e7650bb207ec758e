//! Pipeline orchestration and relevance scoring for faculty outreach.
//!
//! This crate ties the directory, enrichment and profile adapters together
//! into one run (`collect → enrich → rank`, with profile extraction on the
//! side) and owns the scoring engine that ranks candidates against a
//! requester profile.

pub mod pipeline;
pub mod registry;
pub mod scope;
pub mod scoring;
pub mod state;
pub mod text;

pub use pipeline::{Pipeline, ProgressReporter, SilentProgress, filter_and_sort};
pub use registry::{RegistryProgress, RunEntry, RunRegistry, RunStatus};
pub use scope::{ScopeOptions, derive_scopes, score_scopes};
pub use scoring::{RelevanceEngine, Scored, aggregate};
pub use state::{
    DEFAULT_MIN_SCORE, PipelineState, RunConfig, RunMode, RunReport, RunRequest, Stage,
    StageUpdate,
};
