//! Application configuration for the outreach pipeline.
//!
//! User config lives at `~/.outreach/outreach.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OutreachError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "outreach.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".outreach";

// ---------------------------------------------------------------------------
// Config structs (matching outreach.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Faculty directory settings.
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Web search settings used by enrichment.
    #[serde(default)]
    pub search: SearchConfig,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Retry policy for external calls.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Scoring backends.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Auto-scoping.
    #[serde(default)]
    pub scopes: ScopeConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Where run artifacts are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Minimum overall score for a ranked output to be kept.
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Run mode: "full", "collect-only" or "profile-only".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Optional cap on collected records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            min_score: default_min_score(),
            mode: default_mode(),
            limit: None,
        }
    }
}

fn default_output_dir() -> String {
    "./data".into()
}
fn default_min_score() -> f32 {
    0.3
}
fn default_mode() -> String {
    "full".into()
}

/// `[directory]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Root of the faculty directory site.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Maximum concurrent profile-page fetches.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Minimum ms between requests to the same host.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            concurrency: default_concurrency(),
            rate_limit_ms: default_rate_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.iitkgp.ac.in".into()
}
fn default_concurrency() -> u32 {
    3
}
fn default_rate_limit() -> u64 {
    2000
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Serper-compatible search endpoint.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Results requested per query.
    #[serde(default = "default_results_per_query")]
    pub results_per_query: u32,

    /// Institution name added to the general search query.
    #[serde(default = "default_institution")]
    pub institution: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key_env: default_search_key_env(),
            results_per_query: default_results_per_query(),
            institution: default_institution(),
        }
    }
}

fn default_search_endpoint() -> String {
    "https://google.serper.dev/search".into()
}
fn default_search_key_env() -> String {
    "SERPER_API_KEY".into()
}
fn default_results_per_query() -> u32 {
    3
}
fn default_institution() -> String {
    "IIT Kharagpur".into()
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for extraction, matching and writing.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            temperature: default_temperature(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "openai/gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.3
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts per external call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// "fixed" or "exponential".
    #[serde(default = "default_strategy")]
    pub strategy: String,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: default_strategy(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_strategy() -> String {
    "exponential".into()
}
fn default_base_delay_ms() -> u64 {
    2000
}
fn default_max_delay_ms() -> u64 {
    10_000
}

/// `[scoring]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Match analyzer: "keyword" or "llm".
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Content generator: "template" or "llm".
    #[serde(default = "default_content")]
    pub content: String,

    /// Upper bound on annotations kept per candidate.
    #[serde(default = "default_max_annotations")]
    pub max_annotations: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            content: default_content(),
            max_annotations: default_max_annotations(),
        }
    }
}

fn default_backend() -> String {
    "keyword".into()
}
fn default_content() -> String {
    "template".into()
}
fn default_max_annotations() -> usize {
    12
}

/// `[scopes]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// How many scopes auto-scoping selects.
    #[serde(default = "default_max_scopes")]
    pub max_scopes: usize,

    /// Scope used when no profile keyword maps to any scope.
    #[serde(default = "default_fallback_scope")]
    pub fallback: String,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            max_scopes: default_max_scopes(),
            fallback: default_fallback_scope(),
        }
    }
}

fn default_max_scopes() -> usize {
    5
}
fn default_fallback_scope() -> String {
    "CS".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.outreach/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| OutreachError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.outreach/outreach.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| OutreachError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| OutreachError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| OutreachError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| OutreachError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| OutreachError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read an API key from the environment variable named by `var_name`.
pub fn read_api_key(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.openrouter.api_key_env;
    match read_api_key(var_name) {
        Some(_) => Ok(()),
        None => Err(OutreachError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(toml_str.contains("SERPER_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.retry.max_attempts, 3);
        assert_eq!(parsed.directory.rate_limit_ms, 2000);
        assert_eq!(parsed.scopes.fallback, "CS");
        assert!((parsed.defaults.min_score - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
min_score = 0.5
limit = 10

[scoring]
backend = "llm"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.limit, Some(10));
        assert_eq!(config.defaults.mode, "full");
        assert_eq!(config.scoring.backend, "llm");
        assert_eq!(config.scoring.content, "template");
        assert_eq!(config.directory.concurrency, 3);
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openrouter.api_key_env = "OUTREACH_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
