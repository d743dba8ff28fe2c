//! Publish collaborator that renders the entity without writing anywhere.

use async_trait::async_trait;
use tracing::{info, instrument};

use entitygraph_shared::{CandidateEntity, PublishOptions, PublishOutcome, Result};

use crate::collaborators::EntityPublisher;

/// Renders the Wikibase edit payload, logs it and reports what a live publish
/// would have written. Always reports `dry_run = true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunPublisher;

#[async_trait]
impl EntityPublisher for DryRunPublisher {
    #[instrument(skip_all, fields(target = %options.target_environment))]
    async fn publish(
        &self,
        entity: &CandidateEntity,
        options: PublishOptions,
    ) -> Result<PublishOutcome> {
        let payload = entity.to_wikibase_json();
        let properties_published = entity.facts.len();
        let references_published = entity.reference_count();

        info!(
            properties = properties_published,
            references = references_published,
            requested_dry_run = options.dry_run,
            "dry-run publish"
        );
        info!(payload = %payload, "wikibase payload");

        Ok(PublishOutcome {
            succeeded: true,
            external_id: None,
            properties_published,
            references_published,
            dry_run: true,
            error: None,
        })
    }
}
