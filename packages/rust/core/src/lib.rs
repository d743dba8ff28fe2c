//! Core pipeline orchestration for Entitygraph.
//!
//! This crate ties together crawling, fingerprinting, property selection,
//! entity construction, notability gating and publishing into the
//! crawl-fingerprint-publish (CFP) run exposed as [`CfpPipeline`].

pub mod collaborators;
pub mod entity;
pub mod fingerprint;
pub mod pipeline;
pub mod progress;
pub mod publish;

pub use collaborators::{EntityPublisher, Fingerprinter, SiteCrawler};
pub use entity::{EntityInput, attach_citations, build_entity};
pub use fingerprint::LlmFingerprinter;
pub use pipeline::{CfpPipeline, PipelineSettings, fallback_name, split_budget, validate_subject_url};
pub use progress::{ProgressObserver, ProgressTracker, SilentProgress};
pub use publish::DryRunPublisher;
