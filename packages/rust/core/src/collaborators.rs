//! Collaborator contracts consumed by the pipeline.
//!
//! Implementations are injected into [`CfpPipeline`](crate::CfpPipeline) as
//! `Arc<dyn ...>` so tests can substitute in-memory fakes.

use async_trait::async_trait;

use entitygraph_shared::{
    CandidateEntity, FingerprintAnalysis, FingerprintContext, PublishOptions, PublishOutcome,
    Result,
};

pub use entitygraph_crawler::SiteCrawler;

/// Measures how visible a subject is to language models.
#[async_trait]
pub trait Fingerprinter: Send + Sync {
    async fn fingerprint_with_context(&self, context: FingerprintContext)
    -> Result<FingerprintAnalysis>;
}

/// Writes a candidate entity to the knowledge base.
///
/// An explicit unsuccessful response is `Ok(PublishOutcome { succeeded: false, .. })`;
/// `Err` is reserved for transport-level failures.
#[async_trait]
pub trait EntityPublisher: Send + Sync {
    async fn publish(
        &self,
        entity: &CandidateEntity,
        options: PublishOptions,
    ) -> Result<PublishOutcome>;
}
