//! Crawl collaborator for Entitygraph.
//!
//! This crate provides:
//! - [`SiteCrawler`]: the crawl collaborator contract consumed by the pipeline
//! - [`HttpSiteCrawler`]: fetches a subject homepage over HTTP with SSRF protection
//! - [`extract`]: structured business data extraction (JSON-LD, meta tags, links)

pub mod engine;
pub mod extract;

use async_trait::async_trait;
use entitygraph_shared::CrawlOutcome;

pub use engine::{HttpSiteCrawler, is_ssrf_target};
pub use extract::extract_source_data;

/// Fetches structured source data for a subject URL.
///
/// Must not fail for ordinary problems (network errors, 4xx/5xx); those come
/// back as `CrawlOutcome { succeeded: false, .. }`.
#[async_trait]
pub trait SiteCrawler: Send + Sync {
    async fn crawl(&self, url: &str) -> CrawlOutcome;
}
