//! Shared types, error model, and configuration for Entitygraph.
//!
//! This crate is the foundation depended on by all other Entitygraph crates.
//! It provides:
//! - [`EntityGraphError`]: the unified error type
//! - Domain types: pipeline requests/results ([`types`]), crawled source data
//!   ([`source`]), candidate entities ([`entity`]), notability evidence ([`evidence`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod entity;
pub mod error;
pub mod evidence;
pub mod source;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlSettingsConfig, DefaultsConfig, OpenRouterConfig, PublishConfig, SearchConfig,
    config_dir, config_file_path, expand_home, init_config, load_config, load_config_from,
    resolve_secret, validate_api_key,
};
pub use entity::{CandidateEntity, Fact, FactValue, PropertyId, ProvenanceOrigin, ProvenanceReference};
pub use error::{EntityGraphError, Result};
pub use evidence::{
    AssessmentBasis, NotabilityVerdict, Reference, ReferenceAssessment, SourceCategory,
};
pub use source::{
    Address, Coordinates, IdentityOrigin, Location, SocialProfiles, SourceData, SourceField,
    SubjectIdentity, present,
};
pub use types::{
    CrawlOutcome, DEFAULT_TIMEOUT_BUDGET_MS, FingerprintAnalysis, FingerprintContext,
    FingerprintProbe, PipelineOptions, PipelineRequest, PipelineResult, ProgressEvent,
    PublishOptions, PublishOutcome, RunId, SkipReason, StageName, StageOutcome, StageOutcomes,
    StageStatus, TargetEnvironment, Tier,
};
