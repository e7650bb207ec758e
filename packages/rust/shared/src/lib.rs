//! Shared types, error model, retry policy and configuration for the
//! outreach pipeline.
//!
//! This crate is the foundation depended on by all other outreach crates.
//! It provides:
//! - [`OutreachError`], the unified error type
//! - Domain types ([`CandidateRecord`], [`EnrichedRecord`], [`RequesterProfile`],
//!   [`MatchAnnotation`], [`RankedOutput`])
//! - [`RetryPolicy`] for bounded retries of external calls
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod profile;
pub mod retry;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, DirectoryConfig, OpenRouterConfig, RetrySettings, ScopeConfig,
    ScoringConfig, SearchConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, read_api_key, validate_api_key,
};
pub use error::{OutreachError, Result};
pub use profile::{Education, Experience, RequesterProfile, Skills};
pub use retry::{Backoff, DEFAULT_MAX_ATTEMPTS, RetryPolicy};
pub use types::{
    CONFIDENCE_STEP, CandidateRecord, EnrichedRecord, GenerationMeta, MatchAnnotation,
    MatchCategory, OutreachMessage, RankedOutput, Reference, RunId,
};
