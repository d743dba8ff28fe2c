//! LLM visibility fingerprinting: ask a model about the subject's market and
//! count how often the subject comes up unprompted.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument};

use entitygraph_notability::{TextAssessor, delegalize};
use entitygraph_shared::{FingerprintAnalysis, FingerprintContext, FingerprintProbe, Result};

use crate::collaborators::Fingerprinter;

/// Fingerprinter backed by a [`TextAssessor`].
pub struct LlmFingerprinter {
    assessor: Arc<dyn TextAssessor>,
}

impl LlmFingerprinter {
    pub fn new(assessor: Arc<dyn TextAssessor>) -> Self {
        Self { assessor }
    }
}

#[async_trait]
impl Fingerprinter for LlmFingerprinter {
    #[instrument(skip_all, fields(name = %context.name))]
    async fn fingerprint_with_context(
        &self,
        context: FingerprintContext,
    ) -> Result<FingerprintAnalysis> {
        let needles = name_variants(&context.name);
        let mut probes = Vec::new();

        for prompt in probe_prompts(&context) {
            let answer = self.assessor.assess(&prompt).await?;
            let mentioned = mentions(&answer, &needles);
            debug!(mentioned, "probe answered");
            probes.push(FingerprintProbe { prompt, mentioned });
        }

        let hits = probes.iter().filter(|p| p.mentioned).count();
        let mention_rate = if probes.is_empty() {
            0.0
        } else {
            hits as f64 / probes.len() as f64
        };
        let visibility_score = (mention_rate * 100.0).round() as u8;

        info!(hits, probes = probes.len(), visibility_score, "fingerprint complete");

        Ok(FingerprintAnalysis {
            visibility_score,
            mention_rate,
            probes,
            analyzed_at: Utc::now(),
        })
    }
}

fn probe_prompts(context: &FingerprintContext) -> Vec<String> {
    let place = context
        .location
        .as_ref()
        .and_then(|l| l.display_name())
        .map(|p| format!(" in {p}"))
        .unwrap_or_default();
    let category = &context.category;

    vec![
        format!("What are the best {category} options{place}? List specific businesses by name."),
        format!("I need a recommendation for a {category}{place}. Which businesses would you suggest?"),
        format!("What do you know about {} ({})?", context.name, context.url),
    ]
}

/// Lowercased full name plus its delegalized form, if different.
fn name_variants(name: &str) -> Vec<String> {
    let full = name.trim().to_lowercase();
    let short = delegalize(name.trim()).to_lowercase();
    let mut variants = vec![full];
    if !short.is_empty() && !variants.contains(&short) {
        variants.push(short);
    }
    variants.retain(|v| !v.is_empty());
    variants
}

fn mentions(answer: &str, needles: &[String]) -> bool {
    let answer = answer.to_lowercase();
    needles.iter().any(|n| answer.contains(n.as_str()))
}
