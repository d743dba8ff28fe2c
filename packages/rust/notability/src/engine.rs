//! The notability assessment engine.
//!
//! `assess` normalizes the subject name, discovers references through the
//! search collaborator under the shared daily quota, grades them with the
//! text-assessment collaborator (or the keyword heuristic when that fails),
//! and folds the grades into a [`NotabilityVerdict`].

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use entitygraph_shared::{
    AppConfig, AssessmentBasis, Location, NotabilityVerdict, Reference, ReferenceAssessment,
    Result, SourceCategory,
};
use tracing::{debug, info, instrument, warn};

use crate::assessor::TextAssessor;
use crate::heuristic;
use crate::query::{build_queries, compact_name, dedup_key, delegalize, normalize_name};
use crate::quota::DailyQuota;
use crate::rubric::{self, RubricResponse};
use crate::search::ReferenceSearch;

/// Maximum citations carried on a verdict.
pub const MAX_CITATIONS: usize = 5;

const RATE_LIMITED_CONFIDENCE: f64 = 0.5;
const NOT_NOTABLE_CONFIDENCE: f64 = 0.6;
const HEURISTIC_SCALE: f64 = 0.8;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Runtime settings for a [`NotabilityEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotabilitySettings {
    pub daily_quota: u32,
    pub max_results_per_query: u32,
}

impl Default for NotabilitySettings {
    fn default() -> Self {
        Self {
            daily_quota: 100,
            max_results_per_query: 10,
        }
    }
}

impl From<&AppConfig> for NotabilitySettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            daily_quota: config.search.daily_quota,
            max_results_per_query: config.search.max_results_per_query,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Decides whether a subject clears the evidentiary bar for publishing.
///
/// One instance owns the daily quota; share it (`Arc`) across every pipeline
/// run in the process.
pub struct NotabilityEngine {
    search: Arc<dyn ReferenceSearch>,
    assessor: Option<Arc<dyn TextAssessor>>,
    quota: DailyQuota,
    max_results_per_query: u32,
}

impl NotabilityEngine {
    /// Engine with a text-assessment collaborator; the keyword heuristic is
    /// only used when that collaborator fails.
    pub fn new(
        search: Arc<dyn ReferenceSearch>,
        assessor: Arc<dyn TextAssessor>,
        settings: NotabilitySettings,
    ) -> Self {
        Self {
            search,
            assessor: Some(assessor),
            quota: DailyQuota::new(settings.daily_quota),
            max_results_per_query: settings.max_results_per_query,
        }
    }

    /// Engine that always grades with the keyword heuristic.
    pub fn heuristic_only(search: Arc<dyn ReferenceSearch>, settings: NotabilitySettings) -> Self {
        Self {
            search,
            assessor: None,
            quota: DailyQuota::new(settings.daily_quota),
            max_results_per_query: settings.max_results_per_query,
        }
    }

    pub fn quota(&self) -> &DailyQuota {
        &self.quota
    }

    /// Assess `subject_name`. Never fails: collaborator errors degrade to
    /// lower-confidence verdicts.
    #[instrument(skip_all, fields(subject = %subject_name))]
    pub async fn assess(
        &self,
        subject_name: &str,
        location: Option<&Location>,
    ) -> NotabilityVerdict {
        let name = normalize_name(subject_name);
        if name != subject_name.trim() {
            debug!(normalized = %name, "stripped numeric suffix from subject name");
        }

        let references = match self.discover(&name, location).await {
            Ok(references) => references,
            Err(e) => {
                warn!(error = %e, "skipping assessment");
                return NotabilityVerdict::without_references(
                    AssessmentBasis::RateLimited,
                    RATE_LIMITED_CONFIDENCE,
                    "rate limited: daily search quota exhausted",
                    vec!["Retry after the daily search quota resets".into()],
                );
            }
        };

        if references.is_empty() {
            info!("no references found");
            return NotabilityVerdict::without_references(
                AssessmentBasis::NoReferences,
                0.0,
                "no references found",
                missing_category_recommendations(&[]),
            );
        }

        let (basis, rubric) = self.grade(&name, &references).await;
        let verdict = build_verdict(&references, basis, rubric);

        info!(
            notable = verdict.is_notable,
            confidence = verdict.confidence,
            references = verdict.total_references,
            serious = verdict.serious_reference_count,
            basis = ?verdict.basis,
            "notability assessed"
        );
        verdict
    }

    /// Run the query plan. Fails with `QuotaExceeded` only when the quota
    /// refused the very first query.
    async fn discover(&self, name: &str, location: Option<&Location>) -> Result<Vec<Reference>> {
        let mut references = Vec::new();
        let mut seen = HashSet::new();

        let queries = build_queries(name, location);
        for (i, query) in queries.iter().enumerate() {
            if let Err(e) = self.quota.try_acquire() {
                if i == 0 {
                    return Err(e);
                }
                warn!(
                    quota_used = self.quota.used(),
                    skipped_queries = queries.len() - i,
                    "search quota ran out mid-assessment"
                );
                break;
            }

            match self.search.search(query, self.max_results_per_query).await {
                Ok(found) => {
                    debug!(%query, results = found.len(), quota_used = self.quota.used(), "search done");
                    references.extend(
                        found
                            .into_iter()
                            .filter(|r| seen.insert(dedup_key(&r.url))),
                    );
                }
                Err(e) => warn!(%query, error = %e, "reference search failed"),
            }
        }

        Ok(references)
    }

    async fn grade(&self, name: &str, references: &[Reference]) -> (AssessmentBasis, RubricResponse) {
        if let Some(assessor) = &self.assessor {
            let prompt = rubric::build_prompt(name, references);
            let graded = match assessor.assess(&prompt).await {
                Ok(raw) => rubric::parse_response(&raw, references.len()),
                Err(e) => Err(e),
            };
            match graded {
                Ok(response) => return (AssessmentBasis::Model, response),
                Err(e) => warn!(error = %e, "assessment failed, using heuristic fallback"),
            }
        }

        let subject_key = compact_name(&delegalize(name));
        (
            AssessmentBasis::Heuristic,
            RubricResponse {
                assessments: heuristic::assess_references(references, &subject_key),
                summary: None,
                recommendations: Vec::new(),
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Verdict assembly
// ---------------------------------------------------------------------------

/// Notable iff a qualifying reference exists, or the business has its own page
/// plus at least one independent directory or review listing.
pub fn is_notable(assessments: &[ReferenceAssessment]) -> bool {
    let any_qualifying = assessments.iter().any(ReferenceAssessment::qualifies);
    let has_company = assessments
        .iter()
        .any(|a| a.source_category == SourceCategory::Company);
    let has_independent_listing = assessments.iter().any(|a| {
        a.is_independent
            && matches!(
                a.source_category,
                SourceCategory::Directory | SourceCategory::Review
            )
    });
    any_qualifying || (has_company && has_independent_listing)
}

/// Best qualifying references: category rank, then trust score descending.
pub fn select_citations(
    references: &[Reference],
    assessments: &[ReferenceAssessment],
) -> Vec<Reference> {
    let mut qualifying: Vec<&ReferenceAssessment> =
        assessments.iter().filter(|a| a.qualifies()).collect();
    qualifying.sort_by_key(|a| (a.source_category.citation_rank(), Reverse(a.trust_score)));
    qualifying
        .into_iter()
        .filter_map(|a| references.get(a.reference_index).cloned())
        .take(MAX_CITATIONS)
        .collect()
}

/// Confidence for a model-graded verdict; the heuristic scales this down.
fn confidence(notable: bool, assessments: &[ReferenceAssessment]) -> f64 {
    if !notable {
        return NOT_NOTABLE_CONFIDENCE;
    }
    let qualifying: Vec<u8> = assessments
        .iter()
        .filter(|a| a.qualifies())
        .map(|a| a.trust_score)
        .collect();
    let count = qualifying.len().min(4) as f64;
    let avg_trust = if qualifying.is_empty() {
        0.0
    } else {
        qualifying.iter().map(|&t| f64::from(t)).sum::<f64>() / qualifying.len() as f64
    };
    (0.5 + 0.1 * count + 0.1 * avg_trust / 100.0).min(1.0)
}

/// Suggestions based on which serious categories have no qualifying reference.
fn missing_category_recommendations(assessments: &[ReferenceAssessment]) -> Vec<String> {
    let covered = |categories: &[SourceCategory]| {
        assessments
            .iter()
            .any(|a| a.qualifies() && categories.contains(&a.source_category))
    };

    let mut recommendations = Vec::new();
    if !covered(&[SourceCategory::News]) {
        recommendations.push("Earn coverage from local news outlets".to_string());
    }
    if !covered(&[SourceCategory::Directory, SourceCategory::Review]) {
        recommendations.push(
            "Claim listings on major business directories (Google Business Profile, Yelp, BBB)"
                .to_string(),
        );
    }
    if !covered(&[SourceCategory::Government]) {
        recommendations
            .push("Make sure the business registration is visible in a public government registry".to_string());
    }
    recommendations
}

fn build_verdict(
    references: &[Reference],
    basis: AssessmentBasis,
    rubric: RubricResponse,
) -> NotabilityVerdict {
    let assessments = &rubric.assessments;
    let notable = is_notable(assessments);

    let mut confidence = confidence(notable, assessments);
    if basis == AssessmentBasis::Heuristic {
        confidence *= HEURISTIC_SCALE;
    }

    let qualifying = assessments.iter().filter(|a| a.qualifies()).count();
    let serious = assessments.iter().filter(|a| a.is_serious).count();
    let independent = assessments.iter().filter(|a| a.is_independent).count();
    let public = assessments.iter().filter(|a| a.is_publicly_available).count();

    let summary = rubric.summary.unwrap_or_else(|| {
        format!(
            "{qualifying} of {} references are serious, independent and public",
            references.len()
        )
    });

    let mut recommendations = rubric.recommendations;
    if !notable {
        for rec in missing_category_recommendations(assessments) {
            if !recommendations.contains(&rec) {
                recommendations.push(rec);
            }
        }
    }

    NotabilityVerdict {
        is_notable: notable,
        confidence,
        basis,
        total_references: references.len(),
        serious_reference_count: serious,
        publicly_available_count: public,
        independent_count: independent,
        summary,
        top_citations: select_citations(references, assessments),
        recommendations,
    }
}
