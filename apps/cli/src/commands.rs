//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use entitygraph_core::{
    CfpPipeline, DryRunPublisher, Fingerprinter, LlmFingerprinter, PipelineSettings,
    ProgressObserver,
};
use entitygraph_crawler::HttpSiteCrawler;
use entitygraph_notability::{
    GoogleSearchClient, NotabilityEngine, NotabilitySettings, OpenRouterClient, ReferenceSearch,
    TextAssessor,
};
use entitygraph_properties::{recommend_properties, select_properties};
use entitygraph_shared::{
    AppConfig, EntityGraphError, FingerprintAnalysis, FingerprintContext, Location,
    NotabilityVerdict, PipelineOptions, PipelineRequest, PipelineResult, ProgressEvent, Reference,
    RunId, SourceData, TargetEnvironment, Tier, expand_home, init_config, load_config,
};
use entitygraph_storage::RunStore;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

/// Crates whose log output the verbosity flag controls.
const LOG_TARGETS: &[&str] = &[
    "entitygraph_cli",
    "entitygraph_core",
    "entitygraph_crawler",
    "entitygraph_notability",
    "entitygraph_properties",
    "entitygraph_shared",
    "entitygraph_storage",
];

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Entitygraph: turn business websites into knowledge-graph entities.
#[derive(Parser)]
#[command(
    name = "entitygraph",
    version,
    about = "Crawl a business website, fingerprint its AI visibility and build a knowledge-graph entity.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
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
    /// Run the crawl-fingerprint-publish pipeline for a URL.
    Run(RunArgs),

    /// Assess whether a business is notable enough to publish.
    Assess {
        /// Business name.
        name: String,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        state: Option<String>,

        #[arg(long)]
        country: Option<String>,

        /// Print the verdict as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show which knowledge-base properties a tier would publish.
    Properties {
        /// Subscription tier: free, pro or agency.
        #[arg(long, default_value = "free")]
        tier: Tier,

        /// Agency enrichment level.
        #[arg(long)]
        level: Option<u32>,

        /// JSON file with crawled source data.
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Inspect persisted pipeline runs.
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `entitygraph run`.
#[derive(Args)]
pub(crate) struct RunArgs {
    /// Business website URL.
    pub url: String,

    /// Subscription tier (defaults to config).
    #[arg(long)]
    pub tier: Option<Tier>,

    /// Agency enrichment level.
    #[arg(long)]
    pub enrichment_level: Option<u32>,

    /// Skip the AI-visibility fingerprint stage.
    #[arg(long)]
    pub no_fingerprint: bool,

    /// Publish the entity if the subject is notable.
    #[arg(long)]
    pub publish: bool,

    /// Target the production knowledge base instead of the test instance.
    #[arg(long)]
    pub production: bool,

    /// Total crawl + fingerprint budget in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Do not derive a subject from the URL when the crawl fails.
    #[arg(long)]
    pub no_fallback: bool,

    /// Print the full result as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Stored-run subcommands.
#[derive(Subcommand)]
pub(crate) enum RunsAction {
    /// List recent runs.
    List {
        #[arg(long, default_value = "20")]
        limit: u32,
    },
    /// Show one run in full.
    Show {
        /// Run ID.
        id: String,

        /// Print the stored result as JSON.
        #[arg(long)]
        json: bool,
    },
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

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

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
        Command::Assess {
            name,
            city,
            state,
            country,
            json,
        } => {
            let location = Location {
                city,
                state,
                country,
            };
            cmd_assess(&name, location, json).await
        }
        Command::Properties {
            tier,
            level,
            source,
        } => cmd_properties(tier, level, source),
        Command::Runs { action } => match action {
            RunsAction::List { limit } => cmd_runs_list(limit).await,
            RunsAction::Show { id, json } => cmd_runs_show(&id, json).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Collaborator wiring
// ---------------------------------------------------------------------------

/// Stand-in for a collaborator whose credentials are not configured. Only
/// wired where the stage that would call it is switched off.
struct Unconfigured(&'static str);

impl Unconfigured {
    fn error(&self) -> EntityGraphError {
        EntityGraphError::config(format!("{} is not configured", self.0))
    }
}

#[async_trait]
impl Fingerprinter for Unconfigured {
    async fn fingerprint_with_context(
        &self,
        _context: FingerprintContext,
    ) -> entitygraph_shared::Result<FingerprintAnalysis> {
        Err(self.error())
    }
}

#[async_trait]
impl ReferenceSearch for Unconfigured {
    async fn search(
        &self,
        _query: &str,
        _max_results: u32,
    ) -> entitygraph_shared::Result<Vec<Reference>> {
        Err(self.error())
    }
}

/// OpenRouter client if its key is set.
fn optional_assessor(config: &AppConfig) -> Option<Arc<dyn TextAssessor>> {
    match OpenRouterClient::from_config(config) {
        Ok(client) => {
            info!(model = client.model(), "using OpenRouter for text assessment");
            Some(Arc::new(client))
        }
        Err(e) => {
            warn!(error = %e, "text assessment unavailable, notability will use the keyword heuristic");
            None
        }
    }
}

fn notability_engine(
    config: &AppConfig,
    search: Arc<dyn ReferenceSearch>,
    assessor: Option<Arc<dyn TextAssessor>>,
) -> NotabilityEngine {
    let settings = NotabilitySettings::from(config);
    match assessor {
        Some(assessor) => NotabilityEngine::new(search, assessor, settings),
        None => NotabilityEngine::heuristic_only(search, settings),
    }
}

fn build_pipeline(config: &AppConfig, options: &PipelineOptions) -> Result<CfpPipeline> {
    let assessor = optional_assessor(config);

    let fingerprinter: Arc<dyn Fingerprinter> = match (&assessor, options.include_fingerprint) {
        (Some(assessor), _) => Arc::new(LlmFingerprinter::new(Arc::clone(assessor))),
        (None, false) => Arc::new(Unconfigured("fingerprinting")),
        (None, true) => {
            return Err(eyre!(
                "fingerprinting needs an OpenRouter API key (set {}), or pass --no-fingerprint",
                config.openrouter.api_key_env
            ));
        }
    };

    let search: Arc<dyn ReferenceSearch> = if options.should_publish {
        Arc::new(
            GoogleSearchClient::from_config(config)
                .wrap_err("publishing requires reference search for the notability check")?,
        )
    } else {
        Arc::new(Unconfigured("reference search"))
    };

    let crawler = HttpSiteCrawler::new(&config.crawl)?;

    Ok(CfpPipeline::new(
        Arc::new(crawler),
        fingerprinter,
        Arc::new(DryRunPublisher),
        Arc::new(notability_engine(config, search, assessor)),
        PipelineSettings::from(config),
    ))
}

async fn open_store(config: &AppConfig) -> Result<RunStore> {
    let path = expand_home(&config.defaults.database_path);
    Ok(RunStore::open(&path).await?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(args: RunArgs) -> Result<()> {
    let config = load_config()?;

    let mut options = PipelineOptions::from(&config);
    if let Some(tier) = args.tier {
        options.tier = tier;
    }
    if args.enrichment_level.is_some() {
        options.enrichment_level = args.enrichment_level;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        options.timeout_budget_ms = timeout_ms;
    }
    options.include_fingerprint &= !args.no_fingerprint;
    options.allow_fallback_data &= !args.no_fallback;
    options.should_publish = args.publish;
    if args.production {
        options.target_environment = TargetEnvironment::Production;
    }

    info!(
        url = %args.url,
        tier = %options.tier,
        fingerprint = options.include_fingerprint,
        publish = options.should_publish,
        "starting run"
    );

    let pipeline = build_pipeline(&config, &options)?;
    let store = open_store(&config).await?;

    let progress = CliProgress::new();
    let result = pipeline
        .run(PipelineRequest::new(args.url, options), &progress)
        .await;
    progress.finish();

    store.insert_run(&result).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if let Some(error) = &result.terminal_error {
        return Err(eyre!("{error}"));
    }
    Ok(())
}

async fn cmd_assess(name: &str, location: Location, json: bool) -> Result<()> {
    let config = load_config()?;
    let search = GoogleSearchClient::from_config(&config)?;
    let engine = notability_engine(&config, Arc::new(search), optional_assessor(&config));

    let location = (!location.is_empty()).then_some(location);
    let verdict = engine.assess(name, location.as_ref()).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        print_verdict(&verdict);
    }
    Ok(())
}

fn cmd_properties(tier: Tier, level: Option<u32>, source: Option<PathBuf>) -> Result<()> {
    let source: Option<SourceData> = match source {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            Some(
                serde_json::from_str(&content)
                    .wrap_err_with(|| format!("{} is not valid source data JSON", path.display()))?,
            )
        }
        None => None,
    };

    let selection = select_properties(tier, level, source.as_ref());

    println!();
    println!("  Properties for tier {tier} (level {}):", level.unwrap_or(0));
    for property in &selection.properties {
        println!(
            "    {:<7} {:<9} {:<15} {}",
            property.id.as_str(),
            format!("{:?}", property.priority).to_lowercase(),
            format!("{:?}", property.category).to_lowercase(),
            property.label,
        );
    }

    if let Some(source) = &source {
        let included = selection.ids();
        let recommended = recommend_properties(&included, source, tier);
        if !recommended.is_empty() {
            println!();
            println!("  Available with more enrichment:");
            for property in recommended {
                println!("    {:<7} {}", property.id.as_str(), property.label);
            }
        }
    }
    println!();
    Ok(())
}

async fn cmd_runs_list(limit: u32) -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;
    let runs = store.list_runs(limit).await?;

    if runs.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    println!();
    for run in runs {
        let status = if run.overall_succeeded { "ok  " } else { "FAIL" };
        let notable = match run.is_notable {
            Some(true) => "notable",
            Some(false) => "not notable",
            None => "-",
        };
        println!(
            "  {status} {}  {:<40} {:<12} {:>6}ms  {}",
            run.run_id,
            run.subject_name.as_deref().unwrap_or(&run.subject_url),
            notable,
            run.total_duration_ms,
            run.created_at,
        );
    }
    println!();
    Ok(())
}

async fn cmd_runs_show(id: &str, json: bool) -> Result<()> {
    let run_id: RunId = id.parse().map_err(|e| eyre!("invalid run ID '{id}': {e}"))?;
    let config = load_config()?;
    let path = expand_home(&config.defaults.database_path);
    let store = RunStore::open_readonly(&path).await?;

    let result = store
        .get_run(&run_id)
        .await?
        .ok_or_else(|| eyre!("no run with ID {run_id}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
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
// Output
// ---------------------------------------------------------------------------

fn print_result(result: &PipelineResult) {
    println!();
    if result.overall_succeeded {
        println!("  Pipeline completed successfully!");
    } else {
        println!("  Pipeline finished with failures.");
    }
    println!("  Run:     {}", result.run_id);
    println!("  URL:     {}", result.subject_url);
    if let Some(subject) = &result.subject {
        println!("  Subject: {} ({:?})", subject.name, subject.origin);
    }
    if let Some(error) = &result.terminal_error {
        println!("  Error:   {error}");
    }

    println!();
    for stage in result.stages.iter() {
        let detail = stage.error().map(|e| format!("  {e}")).unwrap_or_default();
        println!(
            "  {:<20} {:<25} {:>6}ms{detail}",
            stage.stage.as_str(),
            stage.status.label(),
            stage.duration_ms,
        );
    }

    if let Some(fingerprint) = &result.fingerprint {
        println!();
        println!("  Visibility: {}/100", fingerprint.visibility_score);
    }
    if let Some(entity) = &result.entity {
        println!(
            "  Entity:     {} facts, {} references",
            entity.facts.len(),
            entity.reference_count()
        );
    }
    if let Some(verdict) = &result.notability {
        println!(
            "  Notable:    {} ({:.2} confidence)",
            verdict.is_notable, verdict.confidence
        );
    }
    if let Some(outcome) = &result.publish_outcome {
        println!(
            "  Published:  {}{} ({} properties, {} references)",
            outcome.succeeded,
            if outcome.dry_run { " [dry run]" } else { "" },
            outcome.properties_published,
            outcome.references_published,
        );
    }
    println!("  Time:       {:.1}s", result.total_duration_ms as f64 / 1000.0);
    println!();
}

fn print_verdict(verdict: &NotabilityVerdict) {
    println!();
    println!(
        "  Notable:      {} ({:.2} confidence, {:?})",
        verdict.is_notable, verdict.confidence, verdict.basis
    );
    println!("  References:   {}", verdict.total_references);
    println!("  Serious:      {}", verdict.serious_reference_count);
    println!("  Independent:  {}", verdict.independent_count);
    println!("  Summary:      {}", verdict.summary);

    if !verdict.top_citations.is_empty() {
        println!();
        println!("  Citations:");
        for citation in &verdict.top_citations {
            println!("    - {} ({})", citation.title, citation.url);
        }
    }
    if !verdict.recommendations.is_empty() {
        println!();
        println!("  Recommendations:");
        for recommendation in &verdict.recommendations {
            println!("    - {recommendation}");
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress observer
// ---------------------------------------------------------------------------

/// CLI progress observer using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{prefix:>3}%] {msg}")
                .expect("static template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressObserver for CliProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        self.spinner.set_prefix(event.percent_complete.to_string());
        self.spinner.set_message(event.message.clone());
    }
}
