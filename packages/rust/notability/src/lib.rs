//! Notability assessment for Entitygraph.
//!
//! This crate provides:
//! - [`NotabilityEngine`]: reference discovery, grading and the eligibility verdict
//! - [`DailyQuota`]: the process-wide search budget, owned by the engine
//! - Collaborator traits [`ReferenceSearch`] and [`TextAssessor`] with their
//!   HTTP implementations ([`GoogleSearchClient`], [`OpenRouterClient`])

pub mod assessor;
pub mod engine;
pub mod heuristic;
pub mod query;
pub mod quota;
pub mod rubric;
pub mod search;

pub use assessor::{OpenRouterClient, TextAssessor};
pub use engine::{
    MAX_CITATIONS, NotabilityEngine, NotabilitySettings, is_notable, select_citations,
};
pub use query::{build_queries, delegalize, normalize_name};
pub use quota::DailyQuota;
pub use rubric::strip_code_fences;
pub use search::{GoogleSearchClient, ReferenceSearch};
