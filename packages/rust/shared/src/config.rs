//! Application configuration for Entitygraph.
//!
//! User config lives at `~/.entitygraph/entitygraph.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EntityGraphError, Result};
use crate::types::{DEFAULT_TIMEOUT_BUDGET_MS, PipelineOptions, TargetEnvironment, Tier};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "entitygraph.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".entitygraph";

// ---------------------------------------------------------------------------
// Config structs (matching entitygraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global run defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenRouter settings (text assessment + fingerprint probes).
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Reference search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Publish stage settings.
    #[serde(default)]
    pub publish: PublishConfig,

    /// Crawl collaborator settings.
    #[serde(default)]
    pub crawl: CrawlSettingsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub tier: Tier,

    #[serde(default)]
    pub enrichment_level: u32,

    #[serde(default)]
    pub target_environment: TargetEnvironment,

    /// Total budget shared by the crawl and fingerprint stages.
    #[serde(default = "default_timeout_budget")]
    pub timeout_budget_ms: u64,

    #[serde(default = "default_true")]
    pub include_fingerprint: bool,

    /// Derive a subject name from the URL when the crawl fails.
    #[serde(default = "default_true")]
    pub allow_fallback_data: bool,

    /// Where pipeline runs are persisted. `~` expands to the home directory.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            tier: Tier::Free,
            enrichment_level: 0,
            target_environment: TargetEnvironment::Test,
            timeout_budget_ms: default_timeout_budget(),
            include_fingerprint: true,
            allow_fallback_data: true,
            database_path: default_database_path(),
        }
    }
}

fn default_timeout_budget() -> u64 {
    DEFAULT_TIMEOUT_BUDGET_MS
}
fn default_database_path() -> String {
    "~/.entitygraph/runs.db".into()
}
fn default_true() -> bool {
    true
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for reference assessment and fingerprint probes.
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_openrouter_url")]
    pub base_url: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_openrouter_url(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_openrouter_url() -> String {
    "https://openrouter.ai/api/v1".into()
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_engine_id_env")]
    pub engine_id_env: String,

    #[serde(default = "default_search_url")]
    pub base_url: String,

    /// Queries allowed per UTC day, shared by every assessment in the process.
    #[serde(default = "default_daily_quota")]
    pub daily_quota: u32,

    #[serde(default = "default_max_results")]
    pub max_results_per_query: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            engine_id_env: default_engine_id_env(),
            base_url: default_search_url(),
            daily_quota: default_daily_quota(),
            max_results_per_query: default_max_results(),
        }
    }
}

fn default_search_key_env() -> String {
    "GOOGLE_SEARCH_API_KEY".into()
}
fn default_engine_id_env() -> String {
    "GOOGLE_SEARCH_ENGINE_ID".into()
}
fn default_search_url() -> String {
    "https://www.googleapis.com/customsearch/v1".into()
}
fn default_daily_quota() -> u32 {
    100
}
fn default_max_results() -> u32 {
    10
}

/// `[publish]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Deadline for notability assessment plus the publish call.
    #[serde(default = "default_publish_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_true")]
    pub dry_run: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_publish_timeout(),
            dry_run: true,
        }
    }
}

fn default_publish_timeout() -> u64 {
    30_000
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSettingsConfig {
    /// Per-request HTTP timeout.
    #[serde(default = "default_crawl_timeout")]
    pub timeout_secs: u64,

    /// Refuse to fetch loopback/private hosts.
    #[serde(default = "default_true")]
    pub block_private_hosts: bool,
}

impl Default for CrawlSettingsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_crawl_timeout(),
            block_private_hosts: true,
        }
    }
}

fn default_crawl_timeout() -> u64 {
    20
}

// ---------------------------------------------------------------------------
// Runtime options (merged from config + CLI flags)
// ---------------------------------------------------------------------------

impl From<&AppConfig> for PipelineOptions {
    fn from(config: &AppConfig) -> Self {
        let defaults = &config.defaults;
        Self {
            target_environment: defaults.target_environment,
            include_fingerprint: defaults.include_fingerprint,
            should_publish: false,
            timeout_budget_ms: defaults.timeout_budget_ms,
            allow_fallback_data: defaults.allow_fallback_data,
            tier: defaults.tier,
            enrichment_level: (defaults.tier == Tier::Agency).then_some(defaults.enrichment_level),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.entitygraph/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| EntityGraphError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.entitygraph/entitygraph.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| EntityGraphError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        EntityGraphError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| EntityGraphError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| EntityGraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| EntityGraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Read a secret from the environment variable named by config.
pub fn resolve_secret(var_name: &str, what: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(EntityGraphError::config(format!(
            "{what} not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    resolve_secret(&config.openrouter.api_key_env, "OpenRouter API key").map(|_| ())
}
