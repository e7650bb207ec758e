//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use outreach_artifacts::{ArtifactMeta, ArtifactStore, RunCounts, RunSummary};
use outreach_core::{
    Pipeline, PipelineState, ProgressReporter, RegistryProgress, RelevanceEngine, RunMode,
    RunRegistry, RunRequest, ScopeOptions, Stage, derive_scopes, score_scopes,
};
use outreach_directory::{DirectorySource, HttpDirectorySource, JsonDirectorySource};
use outreach_enrichment::{LlmKeywordExtractor, SearchEnricher};
use outreach_llm::{ChatModel, OpenRouterClient};
use outreach_profile::{DocumentProfileExtractor, ProfileExtractor, ProfileSource};
use outreach_shared::{AppConfig, RetryPolicy, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Outreach: rank faculty against your CV and draft the emails.
#[derive(Parser)]
#[command(
    name = "outreach",
    version,
    about = "Collect faculty profiles, rank them against a CV, and draft outreach messages.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the pipeline: collect, enrich, and rank against a profile.
    Run(RunArgs),

    /// Rank previously saved enriched records against a profile.
    Rank {
        /// CV or profile document (json, txt, md, pdf).
        #[arg(long)]
        profile: PathBuf,

        /// Enriched records JSON written by an earlier run.
        #[arg(long)]
        records: PathBuf,

        /// Minimum overall score to keep (defaults to config).
        #[arg(long)]
        min_score: Option<f32>,

        /// Output directory (defaults to config `output_dir`).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Preview the department scopes a profile would select.
    Scopes {
        /// CV or profile document.
        #[arg(long)]
        profile: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
pub(crate) struct RunArgs {
    /// CV or profile document (json, txt, md, pdf).
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Department code to collect (repeatable). Omit to auto-scope from the profile.
    #[arg(long = "scope")]
    pub scopes: Vec<String>,

    /// Maximum number of candidate records.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Minimum overall score to keep (defaults to config).
    #[arg(long)]
    pub min_score: Option<f32>,

    /// full, collect-only or profile-only (defaults to config).
    #[arg(long)]
    pub mode: Option<RunMode>,

    /// Read candidates from a saved JSON file instead of the directory site.
    #[arg(long)]
    pub directory_file: Option<PathBuf>,

    /// Output directory (defaults to config `output_dir`).
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "outreach=info",
        1 => "outreach=debug",
        _ => "outreach=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args).await,
        Command::Rank {
            profile,
            records,
            min_score,
            out,
        } => cmd_rank(&profile, &records, min_score, out).await,
        Command::Scopes { profile } => cmd_scopes(&profile).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Adapter wiring
// ---------------------------------------------------------------------------

/// The OpenRouter client, when an API key is configured.
fn chat_model(config: &AppConfig) -> Option<Arc<dyn ChatModel>> {
    match OpenRouterClient::from_config(config) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            debug!(error = %e, "no chat model, using deterministic extraction and scoring");
            None
        }
    }
}

fn profile_extractor(model: Option<Arc<dyn ChatModel>>) -> DocumentProfileExtractor {
    match model {
        Some(model) => DocumentProfileExtractor::new().with_model(model),
        None => DocumentProfileExtractor::new(),
    }
}

fn build_pipeline(config: &AppConfig, directory_file: Option<&Path>) -> Result<Pipeline> {
    let retry = RetryPolicy::from(&config.retry);
    let model = chat_model(config);

    let directory: Arc<dyn DirectorySource> = match directory_file {
        Some(path) => Arc::new(JsonDirectorySource::new(path)),
        None => Arc::new(HttpDirectorySource::new(&config.directory)?.with_retry(retry)),
    };

    let mut enricher = SearchEnricher::from_config(config)?;
    if let Some(model) = &model {
        enricher = enricher.with_keywords(LlmKeywordExtractor::new(model.clone()));
    }

    let extractor = profile_extractor(model.clone());
    let engine = RelevanceEngine::from_config(config, model)?;

    Ok(
        Pipeline::new(directory, Arc::new(enricher), Arc::new(extractor))
            .with_engine(engine)
            .with_retry(retry)
            .with_enrich_concurrency(config.directory.concurrency as usize)
            .with_scope_options(ScopeOptions::from(&config.scopes)),
    )
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(args: RunArgs) -> Result<()> {
    let config = load_config()?;
    let mode = match args.mode {
        Some(mode) => mode,
        None => config.defaults.mode.parse()?,
    };
    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));
    let pipeline = build_pipeline(&config, args.directory_file.as_deref())?;

    let mut request = RunRequest::new()
        .with_scopes(args.scopes)
        .with_limit(args.limit.or(config.defaults.limit))
        .with_min_score(args.min_score.unwrap_or(config.defaults.min_score))
        .with_mode(mode);
    if let Some(path) = args.profile {
        request = request.with_profile(path);
    }

    let registry = RunRegistry::new();
    let run_id = registry.create(&request)?;
    info!(%run_id, %mode, out = %out.display(), "starting run");

    let reporter = CliProgress::new();
    let progress = RegistryProgress::new(&registry, run_id, &reporter);
    let state = pipeline.run(request, &progress).await;

    let store = ArtifactStore::new(&out);
    let summary = write_artifacts(&store, &state)?;
    print_summary(&state, &summary, store.root());
    Ok(())
}

async fn cmd_rank(
    profile: &Path,
    records: &Path,
    min_score: Option<f32>,
    out: Option<PathBuf>,
) -> Result<()> {
    let config = load_config()?;
    let pipeline = build_pipeline(&config, None)?;

    let source = ProfileSource::Path(profile.to_path_buf());
    let profile = profile_extractor(chat_model(&config))
        .extract(&source)
        .await?;
    let enriched = ArtifactStore::load_enriched(records)?;
    info!(
        profile = %profile.name,
        records = enriched.len(),
        "ranking saved records"
    );

    let reporter = CliProgress::new();
    let state = pipeline
        .rank_only(
            profile,
            enriched,
            min_score.unwrap_or(config.defaults.min_score),
            &reporter,
        )
        .await;

    let out = out.unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));
    let store = ArtifactStore::new(&out);
    let summary = write_artifacts(&store, &state)?;
    print_summary(&state, &summary, store.root());
    Ok(())
}

async fn cmd_scopes(profile: &Path) -> Result<()> {
    let config = load_config()?;
    let source = ProfileSource::Path(profile.to_path_buf());
    let profile = profile_extractor(chat_model(&config)).extract(&source).await?;

    let options = ScopeOptions::from(&config.scopes);
    let mut scores = score_scopes(&profile);
    scores.sort_by(|a, b| b.1.cmp(&a.1));

    println!();
    println!("  Profile: {}", profile.name);
    if scores.is_empty() {
        println!("  No keyword matched a department.");
    }
    for (code, score) in &scores {
        println!("  {code:<4} {score}");
    }
    println!("  Selected: {}", derive_scopes(&profile, &options).join(", "));
    println!();
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Artifacts and summary output
// ---------------------------------------------------------------------------

/// Write the artifacts the run produced, then the summary listing them.
fn write_artifacts(store: &ArtifactStore, state: &PipelineState) -> Result<RunSummary> {
    let mode = state.config().mode;
    let mut artifacts = Vec::new();

    if mode != RunMode::ProfileOnly && state.has_completed(Stage::Collect) {
        artifacts.push(store.write_candidates(state.candidates())?);
    }
    if !state.enriched().is_empty() && state.has_completed(Stage::Enrich) {
        artifacts.push(store.write_enriched(state.enriched())?);
    }
    if state.has_completed(Stage::Rank) {
        artifacts.push(store.write_ranked(state.ranked())?);
        artifacts.extend(store.write_messages(state.ranked())?);
    }

    let summary = summarize(state, artifacts)?;
    store.write_summary(&summary)?;
    Ok(summary)
}

fn summarize(state: &PipelineState, artifacts: Vec<ArtifactMeta>) -> Result<RunSummary> {
    let report = state.report();
    let finished_at = report
        .finished_at
        .ok_or_else(|| eyre!("run {} has not finished", report.run_id))?;
    Ok(RunSummary {
        run_id: report.run_id,
        mode: report.mode.to_string(),
        started_at: report.started_at,
        finished_at,
        counts: RunCounts {
            candidates: report.candidates,
            enriched: report.enriched,
            ranked: report.ranked,
        },
        completed_stages: report
            .completed_stages
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        errors: report.errors,
        artifacts,
    })
}

fn print_summary(state: &PipelineState, summary: &RunSummary, root: &Path) {
    let elapsed = summary.finished_at - summary.started_at;

    println!();
    if summary.errors.is_empty() {
        println!("  Run finished.");
    } else {
        println!("  Run finished with {} error(s).", summary.errors.len());
    }
    println!("  ID:         {}", summary.run_id);
    println!("  Mode:       {}", summary.mode);
    if let Some(scopes) = &state.config().scopes {
        println!("  Scopes:     {}", scopes.join(", "));
    }
    if let Some(profile) = state.profile() {
        println!("  Profile:    {}", profile.name);
    }
    println!("  Candidates: {}", summary.counts.candidates);
    println!("  Enriched:   {}", summary.counts.enriched);
    println!("  Ranked:     {}", summary.counts.ranked);
    println!("  Stages:     {}", summary.completed_stages.join(" → "));
    println!("  Output:     {}", root.display());
    println!(
        "  Time:       {:.1}s",
        elapsed.num_milliseconds() as f64 / 1000.0
    );

    for (i, output) in state.ranked().iter().take(5).enumerate() {
        println!(
            "  {:>2}. {:.2}  {} ({})",
            i + 1,
            output.overall_score,
            output.candidate_name,
            output.department
        );
    }
    for error in &summary.errors {
        println!("  ! {error}");
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: Stage) {
        let message = match stage {
            Stage::Start => "Starting",
            Stage::Collect => "Collecting candidate records",
            Stage::Enrich => "Enriching records",
            Stage::ExtractProfile => "Extracting profile",
            Stage::Rank => "Ranking candidates",
            Stage::End => "Finishing",
        };
        self.spinner.set_message(message);
    }

    fn stage_completed(&self, stage: Stage) {
        self.spinner.println(format!("  ✓ {stage}"));
    }

    fn record_enriched(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Enriching [{current}/{total}] {name}"));
    }

    fn record_scored(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Scoring [{current}/{total}] {name}"));
    }

    fn done(&self, _state: &PipelineState) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use outreach_core::SilentProgress;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_arguments_parse() {
        let cli = Cli::try_parse_from([
            "outreach",
            "run",
            "--profile",
            "cv.pdf",
            "--scope",
            "CS",
            "--scope",
            "EE",
            "--limit",
            "10",
            "--mode",
            "collect-only",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.scopes, vec!["CS", "EE"]);
        assert_eq!(args.limit, Some(10));
        assert_eq!(args.mode, Some(RunMode::CollectOnly));
        assert_eq!(args.profile, Some(PathBuf::from("cv.pdf")));

        assert!(Cli::try_parse_from(["outreach", "run", "--mode", "everything"]).is_err());
    }

    #[tokio::test]
    async fn summary_lists_only_written_artifacts() {
        let dir = std::env::temp_dir().join(format!(
            "outreach-cli-test-{}",
            outreach_shared::RunId::new()
        ));
        let store = ArtifactStore::new(&dir);

        let pipeline = build_pipeline(&AppConfig::default(), Some(&dir.join("missing.json")))
            .unwrap()
            .with_retry(RetryPolicy::immediate(1));
        let state = pipeline
            .run(RunRequest::new().with_mode(RunMode::CollectOnly), &SilentProgress)
            .await;

        // The missing file fails collection, so only the summary is written.
        let summary = write_artifacts(&store, &state).unwrap();
        assert!(summary.artifacts.is_empty());
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.mode, "collect-only");
        assert!(dir.join(outreach_artifacts::SUMMARY_FILE).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
