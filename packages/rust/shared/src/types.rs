//! Pipeline-level domain types: requests, stage outcomes, progress, results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::CandidateEntity;
use crate::evidence::NotabilityVerdict;
use crate::source::{Location, SourceData, SubjectIdentity};

/// Default total timeout budget for one run.
pub const DEFAULT_TIMEOUT_BUDGET_MS: u64 = 60_000;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Tier / environment
// ---------------------------------------------------------------------------

/// Subscription tier. Ordered: `Free < Pro < Agency`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
    Agency,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Agency => "agency",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "agency" => Ok(Self::Agency),
            other => Err(format!("unknown tier '{other}': expected free, pro or agency")),
        }
    }
}

/// Which knowledge-base instance a publish targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetEnvironment {
    #[default]
    Test,
    Production,
}

impl fmt::Display for TargetEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test => f.write_str("test"),
            Self::Production => f.write_str("production"),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineRequest
// ---------------------------------------------------------------------------

/// Per-run options. Immutable once a run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub target_environment: TargetEnvironment,
    pub include_fingerprint: bool,
    pub should_publish: bool,
    pub timeout_budget_ms: u64,
    pub allow_fallback_data: bool,
    /// Subscription tier driving property selection.
    #[serde(default)]
    pub tier: Tier,
    /// Agency-tier enrichment level (ignored for other tiers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment_level: Option<u32>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            target_environment: TargetEnvironment::Test,
            include_fingerprint: true,
            should_publish: false,
            timeout_budget_ms: DEFAULT_TIMEOUT_BUDGET_MS,
            allow_fallback_data: true,
            tier: Tier::Free,
            enrichment_level: None,
        }
    }
}

/// A request to run the CFP pipeline for one subject URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub subject_url: String,
    #[serde(default)]
    pub options: PipelineOptions,
}

impl PipelineRequest {
    pub fn new(subject_url: impl Into<String>, options: PipelineOptions) -> Self {
        Self {
            subject_url: subject_url.into(),
            options,
        }
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Stage names, also used as progress event stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageName {
    Crawling,
    Fingerprinting,
    ConstructingEntity,
    Publishing,
    Completed,
    Failed,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crawling => "crawling",
            Self::Fingerprinting => "fingerprinting",
            Self::ConstructingEntity => "constructing-entity",
            Self::Publishing => "publishing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a stage did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Turned off by request options. Counts as succeeded.
    Configuration,
    /// A prerequisite stage produced nothing to work with.
    MissingUpstream,
}

/// Terminal status of a single stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Skipped { reason: SkipReason },
    TimedOut { budget_ms: u64 },
    Failed { message: String },
    /// Publishing was requested but the subject did not clear the notability bar.
    Ineligible { summary: String },
    NotAttempted,
}

impl StageStatus {
    /// Short machine-friendly label for storage and display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Skipped {
                reason: SkipReason::Configuration,
            } => "skipped",
            Self::Skipped {
                reason: SkipReason::MissingUpstream,
            } => "skipped_missing_upstream",
            Self::TimedOut { .. } => "timed_out",
            Self::Failed { .. } => "failed",
            Self::Ineligible { .. } => "ineligible",
            Self::NotAttempted => "not_attempted",
        }
    }
}

/// Outcome of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: StageName,
    #[serde(flatten)]
    pub status: StageStatus,
    pub duration_ms: u64,
}

impl StageOutcome {
    pub fn new(stage: StageName, status: StageStatus, duration_ms: u64) -> Self {
        Self {
            stage,
            status,
            duration_ms,
        }
    }

    pub fn not_attempted(stage: StageName) -> Self {
        Self::new(stage, StageStatus::NotAttempted, 0)
    }

    pub fn skipped(stage: StageName, reason: SkipReason) -> Self {
        Self::new(stage, StageStatus::Skipped { reason }, 0)
    }

    /// Whether this stage counts as succeeded for the overall verdict.
    /// Configuration skips count; every other non-success does not.
    pub fn succeeded(&self) -> bool {
        matches!(
            self.status,
            StageStatus::Succeeded
                | StageStatus::Skipped {
                    reason: SkipReason::Configuration
                }
        )
    }

    /// Whether the stage actually ran (as opposed to being skipped or never reached).
    pub fn attempted(&self) -> bool {
        !matches!(
            self.status,
            StageStatus::NotAttempted | StageStatus::Skipped { .. }
        )
    }

    /// Error text, if the stage ended in a non-success state that carries one.
    pub fn error(&self) -> Option<String> {
        match &self.status {
            StageStatus::TimedOut { budget_ms } => Some(format!("timeout after {budget_ms}ms")),
            StageStatus::Failed { message } => Some(message.clone()),
            StageStatus::Ineligible { summary } => Some(format!("not notable: {summary}")),
            _ => None,
        }
    }
}

/// The four per-stage outcomes of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcomes {
    pub crawl: StageOutcome,
    pub fingerprint: StageOutcome,
    pub entity: StageOutcome,
    pub publish: StageOutcome,
}

impl StageOutcomes {
    /// All four stages marked as never attempted.
    pub fn not_attempted() -> Self {
        Self {
            crawl: StageOutcome::not_attempted(StageName::Crawling),
            fingerprint: StageOutcome::not_attempted(StageName::Fingerprinting),
            entity: StageOutcome::not_attempted(StageName::ConstructingEntity),
            publish: StageOutcome::not_attempted(StageName::Publishing),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageOutcome> {
        [&self.crawl, &self.fingerprint, &self.entity, &self.publish].into_iter()
    }

    /// AND of every stage's `succeeded()`.
    pub fn all_succeeded(&self) -> bool {
        self.iter().all(StageOutcome::succeeded)
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// A progress notification emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: StageName,
    /// 0-100, non-decreasing within a run.
    pub percent_complete: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Collaborator payloads
// ---------------------------------------------------------------------------

/// Answer from the crawl collaborator. Ordinary failures are reported here, not thrown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlOutcome {
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_data: Option<SourceData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CrawlOutcome {
    pub fn success(source_data: SourceData) -> Self {
        Self {
            succeeded: true,
            source_data: Some(source_data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            source_data: None,
            error: Some(error.into()),
        }
    }
}

/// Context handed to the fingerprint collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintContext {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub category: String,
    #[serde(default)]
    pub source_data: SourceData,
}

/// A single probe sent to a language model during fingerprinting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintProbe {
    pub prompt: String,
    pub mentioned: bool,
}

/// AI-visibility measurement of a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintAnalysis {
    /// 0-100.
    pub visibility_score: u8,
    /// Fraction of probes whose answer mentioned the subject.
    pub mention_rate: f64,
    pub probes: Vec<FingerprintProbe>,
    pub analyzed_at: DateTime<Utc>,
}

/// Options passed to the publish collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOptions {
    pub target_environment: TargetEnvironment,
    pub dry_run: bool,
}

/// Result reported by the publish collaborator, captured verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub properties_published: usize,
    pub references_published: usize,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PublishOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            external_id: None,
            properties_published: 0,
            references_published: 0,
            dry_run: false,
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineResult
// ---------------------------------------------------------------------------

/// Terminal result of one run. Always returned, even for malformed input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: RunId,
    pub subject_url: String,
    pub overall_succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<SubjectIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<CandidateEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_outcome: Option<PublishOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notability: Option<NotabilityVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawl_data: Option<SourceData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<FingerprintAnalysis>,
    pub total_duration_ms: u64,
    pub stages: StageOutcomes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_error: Option<String>,
}

impl PipelineResult {
    /// A result for a run that ended before any stage was attempted.
    pub fn terminal(subject_url: impl Into<String>, error: impl Into<String>, total_duration_ms: u64) -> Self {
        Self {
            run_id: RunId::new(),
            subject_url: subject_url.into(),
            overall_succeeded: false,
            subject: None,
            entity: None,
            publish_outcome: None,
            notability: None,
            crawl_data: None,
            fingerprint: None,
            total_duration_ms,
            stages: StageOutcomes::not_attempted(),
            terminal_error: Some(error.into()),
        }
    }
}
