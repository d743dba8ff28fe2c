//! End-to-end CFP pipeline: URL → crawl → fingerprint → entity → publish.

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use tracing::{error, info, instrument, warn};
use url::Url;

use entitygraph_notability::NotabilityEngine;
use entitygraph_properties::select_properties;
use entitygraph_shared::{
    AppConfig, CandidateEntity, EntityGraphError, FingerprintAnalysis, FingerprintContext,
    IdentityOrigin, NotabilityVerdict, PipelineRequest, PipelineResult, PublishOptions,
    PublishOutcome, Result, RunId, SkipReason, SourceData, SourceField, StageName, StageOutcome,
    StageOutcomes, StageStatus, SubjectIdentity,
};

use crate::collaborators::{EntityPublisher, Fingerprinter, SiteCrawler};
use crate::entity::{EntityInput, attach_citations, build_entity};
use crate::progress::{ProgressObserver, ProgressTracker};

/// Share of the budget given to the crawl when fingerprinting also runs.
const CRAWL_BUDGET_PERCENT: u64 = 60;

const DEFAULT_CATEGORY: &str = "local business";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Process-level settings for a [`CfpPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Deadline for notability assessment plus the publish call.
    pub publish_timeout: Duration,
    /// Passed through to the publish collaborator.
    pub dry_run: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            publish_timeout: Duration::from_secs(30),
            dry_run: true,
        }
    }
}

impl From<&AppConfig> for PipelineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            publish_timeout: Duration::from_millis(config.publish.timeout_ms),
            dry_run: config.publish.dry_run,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Crawl-fingerprint-publish orchestrator.
///
/// Holds no per-run state, so one instance can serve concurrent runs. The
/// notability engine (and its daily quota) is shared through the `Arc`.
pub struct CfpPipeline {
    crawler: Arc<dyn SiteCrawler>,
    fingerprinter: Arc<dyn Fingerprinter>,
    publisher: Arc<dyn EntityPublisher>,
    notability: Arc<NotabilityEngine>,
    settings: PipelineSettings,
}

/// What the publish stage's spawned task produced.
enum PublishAttempt {
    Ineligible(NotabilityVerdict),
    Attempted {
        verdict: NotabilityVerdict,
        entity: CandidateEntity,
        outcome: Result<PublishOutcome>,
    },
}

impl CfpPipeline {
    pub fn new(
        crawler: Arc<dyn SiteCrawler>,
        fingerprinter: Arc<dyn Fingerprinter>,
        publisher: Arc<dyn EntityPublisher>,
        notability: Arc<NotabilityEngine>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            crawler,
            fingerprinter,
            publisher,
            notability,
            settings,
        }
    }

    /// Run the pipeline for one subject. Never fails: every problem is
    /// recorded in the returned [`PipelineResult`], including a panic raised
    /// by a stage or by the progress observer.
    #[instrument(skip_all, fields(url = %request.subject_url))]
    pub async fn run(
        &self,
        request: PipelineRequest,
        progress: &dyn ProgressObserver,
    ) -> PipelineResult {
        let start = Instant::now();
        let subject_url = request.subject_url.clone();
        let tracker = ProgressTracker::new(progress);

        match AssertUnwindSafe(self.run_stages(request, &tracker, start))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let message = format!("pipeline aborted: {}", panic_message(payload.as_ref()));
                error!(error = %message, "pipeline run panicked");
                // The observer itself may be what panicked.
                if catch_unwind(AssertUnwindSafe(|| {
                    tracker.emit(StageName::Failed, 100, message.clone())
                }))
                .is_err()
                {
                    warn!("progress observer panicked on the terminal event");
                }
                PipelineResult::terminal(subject_url, message, elapsed_ms(start))
            }
        }
    }

    async fn run_stages(
        &self,
        request: PipelineRequest,
        tracker: &ProgressTracker<'_>,
        start: Instant,
    ) -> PipelineResult {
        let options = &request.options;

        let url = match validate_subject_url(&request.subject_url) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "rejecting run");
                tracker.emit(StageName::Failed, 100, e.to_string());
                return PipelineResult::terminal(
                    request.subject_url.clone(),
                    e.to_string(),
                    elapsed_ms(start),
                );
            }
        };
        let subject_url = request.subject_url.trim().to_string();
        let run_id = RunId::new();
        let (crawl_budget, fingerprint_budget) =
            split_budget(options.timeout_budget_ms, options.include_fingerprint);

        info!(%run_id, crawl_budget_ms = crawl_budget, fingerprint_budget_ms = fingerprint_budget, "starting pipeline run");

        let mut stages = StageOutcomes::not_attempted();

        // --- Stage 1: Crawl ---
        tracker.emit(StageName::Crawling, 10, format!("Crawling {subject_url}"));
        let stage_start = Instant::now();
        let crawler = Arc::clone(&self.crawler);
        let target = subject_url.clone();
        let crawled = race(StageName::Crawling, crawl_budget, async move {
            crawler.crawl(&target).await
        })
        .await;

        let (crawl_status, crawl_data) = match crawled {
            Ok(outcome) if outcome.succeeded => {
                (StageStatus::Succeeded, Some(outcome.source_data.unwrap_or_default()))
            }
            Ok(outcome) => {
                let message = outcome.error.unwrap_or_else(|| "crawl failed".to_string());
                warn!(error = %message, "crawl failed, continuing with fallback data");
                (StageStatus::Failed { message }, None)
            }
            Err(e) => {
                warn!(error = %e, "crawl did not complete, continuing with fallback data");
                (stage_status(&e), None)
            }
        };
        stages.crawl = StageOutcome::new(StageName::Crawling, crawl_status, elapsed_ms(stage_start));
        tracker.emit(StageName::Crawling, 40, "Crawl finished");

        let subject = resolve_subject(&url, crawl_data.as_ref(), options.allow_fallback_data);
        if subject.is_none() {
            warn!("no subject identity available");
        }

        // --- Stage 2: Fingerprint ---
        let mut fingerprint: Option<FingerprintAnalysis> = None;
        stages.fingerprint = match (&subject, options.include_fingerprint) {
            (_, false) => StageOutcome::skipped(StageName::Fingerprinting, SkipReason::Configuration),
            (None, true) => StageOutcome::skipped(StageName::Fingerprinting, SkipReason::MissingUpstream),
            (Some(subject), true) => {
                tracker.emit(StageName::Fingerprinting, 45, format!("Fingerprinting {}", subject.name));
                let stage_start = Instant::now();
                let context = fingerprint_context(subject, &subject_url, crawl_data.as_ref());
                let fingerprinter = Arc::clone(&self.fingerprinter);
                let raced = race(StageName::Fingerprinting, fingerprint_budget, async move {
                    fingerprinter.fingerprint_with_context(context).await
                })
                .await
                .and_then(|r| r);

                let status = match raced {
                    Ok(analysis) => {
                        fingerprint = Some(analysis);
                        StageStatus::Succeeded
                    }
                    Err(e) => {
                        warn!(error = %e, "fingerprint failed, continuing");
                        stage_status(&e)
                    }
                };
                tracker.emit(StageName::Fingerprinting, 60, "Fingerprint finished");
                StageOutcome::new(StageName::Fingerprinting, status, elapsed_ms(stage_start))
            }
        };

        // --- Stage 3: Entity construction ---
        let mut entity: Option<CandidateEntity> = None;
        stages.entity = match &subject {
            None => StageOutcome::skipped(StageName::ConstructingEntity, SkipReason::MissingUpstream),
            Some(subject) => {
                tracker.emit(StageName::ConstructingEntity, 70, "Constructing entity");
                let stage_start = Instant::now();
                let source = crawl_data.clone().unwrap_or_default();
                let selection =
                    select_properties(options.tier, options.enrichment_level, Some(&source));

                let status = match build_entity(&EntityInput {
                    subject,
                    subject_url: &subject_url,
                    source: &source,
                    crawl_succeeded: crawl_data.is_some(),
                    selection: &selection,
                    retrieved_at: Utc::now(),
                }) {
                    Ok(built) => {
                        info!(facts = built.facts.len(), "entity constructed");
                        entity = Some(built);
                        StageStatus::Succeeded
                    }
                    Err(e) => {
                        warn!(error = %e, "entity construction failed");
                        StageStatus::Failed {
                            message: e.to_string(),
                        }
                    }
                };
                StageOutcome::new(StageName::ConstructingEntity, status, elapsed_ms(stage_start))
            }
        };

        // --- Stage 4: Notability gate + publish ---
        let mut notability: Option<NotabilityVerdict> = None;
        let mut publish_outcome: Option<PublishOutcome> = None;
        stages.publish = match (&subject, entity.clone(), options.should_publish) {
            (_, _, false) => StageOutcome::skipped(StageName::Publishing, SkipReason::Configuration),
            (Some(subject), Some(built), true) => {
                tracker.emit(StageName::Publishing, 85, "Assessing notability and publishing");
                let stage_start = Instant::now();
                let publish_options = PublishOptions {
                    target_environment: options.target_environment,
                    dry_run: self.settings.dry_run,
                };

                let status = match self.publish_stage(subject, built, publish_options).await {
                    Ok(PublishAttempt::Ineligible(verdict)) => {
                        info!(confidence = verdict.confidence, "subject not notable, publish withheld");
                        let summary = verdict.summary.clone();
                        notability = Some(verdict);
                        StageStatus::Ineligible { summary }
                    }
                    Ok(PublishAttempt::Attempted {
                        verdict,
                        entity: cited,
                        outcome,
                    }) => {
                        notability = Some(verdict);
                        entity = Some(cited);
                        let (status, captured) = publish_status(outcome);
                        publish_outcome = Some(captured);
                        status
                    }
                    Err(e) => {
                        warn!(error = %e, "publish stage did not complete");
                        stage_status(&e)
                    }
                };
                tracker.emit(StageName::Publishing, 90, "Publish finished");
                StageOutcome::new(StageName::Publishing, status, elapsed_ms(stage_start))
            }
            (_, _, true) => StageOutcome::skipped(StageName::Publishing, SkipReason::MissingUpstream),
        };

        // --- Done ---
        let overall_succeeded = stages.all_succeeded();
        let total_duration_ms = elapsed_ms(start);
        let (terminal_stage, message) = if overall_succeeded {
            (StageName::Completed, "Pipeline completed")
        } else {
            (StageName::Failed, "Pipeline finished with failed stages")
        };
        tracker.emit(terminal_stage, 100, message);

        info!(
            %run_id,
            overall_succeeded,
            crawl = stages.crawl.status.label(),
            fingerprint = stages.fingerprint.status.label(),
            entity = stages.entity.status.label(),
            publish = stages.publish.status.label(),
            total_duration_ms,
            "pipeline run complete"
        );

        PipelineResult {
            run_id,
            subject_url,
            overall_succeeded,
            subject,
            entity,
            publish_outcome,
            notability,
            crawl_data,
            fingerprint,
            total_duration_ms,
            stages,
            terminal_error: None,
        }
    }

    /// Assess notability and, if notable, cite and publish. Both steps share
    /// the publish deadline.
    async fn publish_stage(
        &self,
        subject: &SubjectIdentity,
        mut entity: CandidateEntity,
        options: PublishOptions,
    ) -> Result<PublishAttempt> {
        let notability = Arc::clone(&self.notability);
        let publisher = Arc::clone(&self.publisher);
        let name = subject.name.clone();
        let location = subject.location.clone();
        let budget = u64::try_from(self.settings.publish_timeout.as_millis()).unwrap_or(u64::MAX);

        race(StageName::Publishing, budget, async move {
            let verdict = notability.assess(&name, location.as_ref()).await;
            if !verdict.is_notable {
                return PublishAttempt::Ineligible(verdict);
            }
            let cited = attach_citations(&mut entity, &verdict.top_citations, Utc::now());
            info!(citations = cited, "publishing notable subject");
            let outcome = publisher.publish(&entity, options).await;
            PublishAttempt::Attempted {
                verdict,
                entity,
                outcome,
            }
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Stage helpers
// ---------------------------------------------------------------------------

/// Run `fut` on its own task, racing it against `budget_ms`. On expiry the
/// task is aborted and its result discarded.
async fn race<T, F>(stage: StageName, budget_ms: u64, fut: F) -> Result<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    if budget_ms == 0 {
        return Err(EntityGraphError::StageTimeout { stage, budget_ms });
    }

    let mut handle = tokio::spawn(fut);
    match tokio::time::timeout(Duration::from_millis(budget_ms), &mut handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_error)) => Err(EntityGraphError::StageFailure {
            stage,
            message: format!("collaborator task aborted: {join_error}"),
        }),
        Err(_) => {
            handle.abort();
            Err(EntityGraphError::StageTimeout { stage, budget_ms })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn stage_status(error: &EntityGraphError) -> StageStatus {
    match error {
        EntityGraphError::StageTimeout { budget_ms, .. } => StageStatus::TimedOut {
            budget_ms: *budget_ms,
        },
        EntityGraphError::StageFailure { message, .. } => StageStatus::Failed {
            message: message.clone(),
        },
        other => StageStatus::Failed {
            message: other.to_string(),
        },
    }
}

/// Map the publish collaborator's answer to a stage status, keeping its
/// response verbatim.
fn publish_status(outcome: Result<PublishOutcome>) -> (StageStatus, PublishOutcome) {
    match outcome {
        Ok(outcome) if outcome.succeeded => (StageStatus::Succeeded, outcome),
        Ok(outcome) => {
            let message = outcome
                .error
                .clone()
                .unwrap_or_else(|| "publish was rejected".to_string());
            warn!(error = %message, "publish unsuccessful");
            (StageStatus::Failed { message }, outcome)
        }
        Err(e) => {
            warn!(error = %e, "publish failed");
            (
                StageStatus::Failed {
                    message: e.to_string(),
                },
                PublishOutcome::failure(e.to_string()),
            )
        }
    }
}

/// `(crawl_ms, fingerprint_ms)` for a total budget.
pub fn split_budget(total_ms: u64, include_fingerprint: bool) -> (u64, u64) {
    if !include_fingerprint {
        return (total_ms, 0);
    }
    let crawl = u64::try_from(u128::from(total_ms) * u128::from(CRAWL_BUDGET_PERCENT) / 100)
        .unwrap_or(total_ms);
    (crawl, total_ms - crawl)
}

/// Accept only absolute `http`/`https` URLs with a host.
pub fn validate_subject_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| EntityGraphError::invalid_input(format!("'{raw}' is not a valid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(EntityGraphError::invalid_input(format!(
            "unsupported URL scheme '{}', expected http or https",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(EntityGraphError::invalid_input(format!("'{raw}' has no host")));
    }
    Ok(url)
}

// ---------------------------------------------------------------------------
// Subject identity
// ---------------------------------------------------------------------------

/// Name and location from crawl data, else a name derived from the URL.
/// `source` is only `Some` when the crawl succeeded.
fn resolve_subject(
    url: &Url,
    source: Option<&SourceData>,
    allow_fallback_data: bool,
) -> Option<SubjectIdentity> {
    let location = source.and_then(SourceData::location);

    if let Some(name) = source.and_then(|s| s.field(SourceField::Name)) {
        return Some(SubjectIdentity {
            name,
            location,
            origin: IdentityOrigin::Crawled,
        });
    }

    if source.is_none() && !allow_fallback_data {
        return None;
    }

    fallback_name(url).map(|name| SubjectIdentity {
        name,
        location,
        origin: IdentityOrigin::UrlFallback,
    })
}

/// `https://www.example-clinic.com` → `"Example Clinic"`.
pub fn fallback_name(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let label = host.trim_start_matches("www.").split('.').next()?;
    let words: Vec<String> = label
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect();
    (!words.is_empty()).then(|| words.join(" "))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn fingerprint_context(
    subject: &SubjectIdentity,
    subject_url: &str,
    source: Option<&SourceData>,
) -> FingerprintContext {
    let source_data = source.cloned().unwrap_or_default();
    let category = source_data
        .field(SourceField::Industry)
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
    FingerprintContext {
        name: subject.name.clone(),
        url: subject_url.to_string(),
        location: subject.location.clone(),
        category,
        source_data,
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use entitygraph_notability::{NotabilitySettings, ReferenceSearch};
    use entitygraph_shared::{
        Address, CrawlOutcome, PipelineOptions, ProgressEvent, ProvenanceOrigin, Reference,
        TargetEnvironment,
    };

    use crate::progress::SilentProgress;

    // -- Fakes ---------------------------------------------------------------

    struct FakeCrawler {
        outcome: CrawlOutcome,
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SiteCrawler for FakeCrawler {
        async fn crawl(&self, _url: &str) -> CrawlOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.outcome.clone()
        }
    }

    struct FakeFingerprinter {
        fail: bool,
        calls: AtomicUsize,
        seen: Mutex<Vec<FingerprintContext>>,
    }

    #[async_trait]
    impl Fingerprinter for FakeFingerprinter {
        async fn fingerprint_with_context(
            &self,
            context: FingerprintContext,
        ) -> Result<FingerprintAnalysis> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(context);
            if self.fail {
                return Err(EntityGraphError::Assessment("model offline".into()));
            }
            Ok(FingerprintAnalysis {
                visibility_score: 33,
                mention_rate: 1.0 / 3.0,
                probes: vec![],
                analyzed_at: Utc::now(),
            })
        }
    }

    struct FakePublisher {
        response: Result<PublishOutcome>,
        calls: AtomicUsize,
        published: Mutex<Option<CandidateEntity>>,
    }

    #[async_trait]
    impl EntityPublisher for FakePublisher {
        async fn publish(
            &self,
            entity: &CandidateEntity,
            _options: PublishOptions,
        ) -> Result<PublishOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.published.lock().unwrap() = Some(entity.clone());
            match &self.response {
                Ok(outcome) => Ok(outcome.clone()),
                Err(e) => Err(EntityGraphError::Publish(e.to_string())),
            }
        }
    }

    /// Returns the same references for every query.
    struct StaticSearch(Vec<Reference>);

    #[async_trait]
    impl ReferenceSearch for StaticSearch {
        async fn search(&self, _query: &str, _max_results: u32) -> Result<Vec<Reference>> {
            Ok(self.0.clone())
        }
    }

    // -- Harness -------------------------------------------------------------

    struct Harness {
        crawler: Arc<FakeCrawler>,
        fingerprinter: Arc<FakeFingerprinter>,
        publisher: Arc<FakePublisher>,
        pipeline: CfpPipeline,
    }

    struct Setup {
        crawl: CrawlOutcome,
        crawl_delay: Duration,
        fingerprint_fails: bool,
        references: Vec<Reference>,
        publish: Result<PublishOutcome>,
        publish_timeout: Duration,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                crawl: CrawlOutcome::success(acme_source()),
                crawl_delay: Duration::ZERO,
                fingerprint_fails: false,
                references: vec![],
                publish: Ok(published()),
                publish_timeout: Duration::from_secs(5),
            }
        }
    }

    fn harness(setup: Setup) -> Harness {
        let crawler = Arc::new(FakeCrawler {
            outcome: setup.crawl,
            delay: setup.crawl_delay,
            calls: AtomicUsize::new(0),
        });
        let fingerprinter = Arc::new(FakeFingerprinter {
            fail: setup.fingerprint_fails,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        });
        let publisher = Arc::new(FakePublisher {
            response: setup.publish,
            calls: AtomicUsize::new(0),
            published: Mutex::new(None),
        });
        let notability = Arc::new(NotabilityEngine::heuristic_only(
            Arc::new(StaticSearch(setup.references)),
            NotabilitySettings::default(),
        ));
        let pipeline = CfpPipeline::new(
            crawler.clone(),
            fingerprinter.clone(),
            publisher.clone(),
            notability,
            PipelineSettings {
                publish_timeout: setup.publish_timeout,
                dry_run: true,
            },
        );
        Harness {
            crawler,
            fingerprinter,
            publisher,
            pipeline,
        }
    }

    fn acme_source() -> SourceData {
        SourceData {
            name: Some("Acme Dental".into()),
            description: Some("Family dentistry in Austin.".into()),
            industry: Some("dentist".into()),
            phone: Some("+1 512 555 0100".into()),
            address: Address {
                city: Some("Austin".into()),
                state: Some("TX".into()),
                country: Some("US".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn published() -> PublishOutcome {
        PublishOutcome {
            succeeded: true,
            external_id: Some("Q4115189".into()),
            properties_published: 5,
            references_published: 4,
            dry_run: true,
            error: None,
        }
    }

    fn gov_reference() -> Reference {
        Reference::new(
            "https://www.austintexas.gov/licenses/acme-dental",
            "Acme Dental business license",
            "Licensed dental practice",
        )
    }

    fn request(url: &str, configure: impl FnOnce(&mut PipelineOptions)) -> PipelineRequest {
        let mut options = PipelineOptions::default();
        configure(&mut options);
        PipelineRequest::new(url, options)
    }

    // -- Input validation ----------------------------------------------------

    #[tokio::test]
    async fn malformed_urls_end_before_any_stage() {
        let h = harness(Setup::default());

        for bad in ["", "not a url", "ftp://acme.test/file", "mailto:hi@acme.test", "/relative/path"] {
            let result = h.pipeline.run(request(bad, |_| {}), &SilentProgress).await;

            assert!(!result.overall_succeeded, "{bad:?}");
            assert!(result.entity.is_none());
            assert!(result.terminal_error.is_some());
            assert!(result.stages.iter().all(|s| !s.attempted()), "{bad:?}");
        }
        assert_eq!(h.crawler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.fingerprinter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn url_validation() {
        assert!(validate_subject_url("https://acme.test").is_ok());
        assert!(validate_subject_url("  http://acme.test/about ").is_ok());
        let err = validate_subject_url("ftp://acme.test").unwrap_err();
        assert!(matches!(err, EntityGraphError::InvalidInput { .. }));
    }

    // -- Stage gating --------------------------------------------------------

    #[tokio::test]
    async fn fingerprint_disabled_is_never_invoked() {
        let h = harness(Setup::default());
        let result = h
            .pipeline
            .run(
                request("https://acme.test", |o| o.include_fingerprint = false),
                &SilentProgress,
            )
            .await;

        assert_eq!(h.fingerprinter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            result.stages.fingerprint.status,
            StageStatus::Skipped {
                reason: SkipReason::Configuration
            }
        );
        assert!(result.stages.fingerprint.succeeded());
        assert!(result.fingerprint.is_none());
    }

    #[tokio::test]
    async fn publish_disabled_is_never_invoked() {
        let h = harness(Setup {
            references: vec![gov_reference()],
            ..Default::default()
        });
        let result = h
            .pipeline
            .run(request("https://acme.test", |_| {}), &SilentProgress)
            .await;

        assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 0);
        assert!(result.publish_outcome.is_none());
        assert!(result.notability.is_none());
        assert!(result.stages.publish.succeeded());
        assert!(result.overall_succeeded);
    }

    // -- Scenarios -----------------------------------------------------------

    #[tokio::test]
    async fn crawl_failure_falls_back_to_url_name() {
        let h = harness(Setup {
            crawl: CrawlOutcome::failure("connection refused"),
            ..Default::default()
        });
        let result = h
            .pipeline
            .run(request("https://www.example-clinic.com", |_| {}), &SilentProgress)
            .await;

        assert!(!result.overall_succeeded);
        assert_eq!(
            result.stages.crawl.status,
            StageStatus::Failed {
                message: "connection refused".into()
            }
        );
        assert_eq!(result.stages.fingerprint.status, StageStatus::Succeeded);
        assert_eq!(result.stages.entity.status, StageStatus::Succeeded);

        let subject = result.subject.as_ref().expect("fallback subject");
        assert_eq!(subject.name, "Example Clinic");
        assert_eq!(subject.origin, IdentityOrigin::UrlFallback);

        let entity = result.entity.as_ref().expect("entity");
        assert_eq!(entity.labels["en"], "Example Clinic");
        assert_eq!(entity.reference_count(), 0);

        let seen = h.fingerprinter.seen.lock().unwrap();
        assert_eq!(seen[0].name, "Example Clinic");
        assert_eq!(seen[0].category, DEFAULT_CATEGORY);
    }

    #[tokio::test]
    async fn notable_subject_is_published() {
        let h = harness(Setup {
            references: vec![gov_reference()],
            ..Default::default()
        });
        let result = h
            .pipeline
            .run(
                request("https://acme.test", |o| {
                    o.include_fingerprint = false;
                    o.should_publish = true;
                    o.target_environment = TargetEnvironment::Production;
                }),
                &SilentProgress,
            )
            .await;

        assert!(result.overall_succeeded);
        assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 1);
        assert!(result.publish_outcome.as_ref().unwrap().succeeded);
        assert!(result.notability.as_ref().unwrap().is_notable);

        // Citations land on the official-name fact before publishing.
        let sent = h.publisher.published.lock().unwrap().clone().expect("published entity");
        let name_fact = sent.fact("P1448").expect("official name");
        assert!(name_fact
            .provenance
            .iter()
            .any(|p| p.origin == ProvenanceOrigin::NotabilityEvidence));
        assert_eq!(result.entity.as_ref(), Some(&sent));
    }

    #[tokio::test]
    async fn non_notable_subject_is_not_published() {
        let h = harness(Setup::default());
        let result = h
            .pipeline
            .run(
                request("https://acme.test", |o| o.should_publish = true),
                &SilentProgress,
            )
            .await;

        assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 0);
        assert!(matches!(result.stages.publish.status, StageStatus::Ineligible { .. }));
        assert!(!result.stages.publish.succeeded());
        assert!(!result.overall_succeeded);
        assert!(result.publish_outcome.is_none());
        assert!(!result.notability.as_ref().unwrap().is_notable);
        assert!(result.entity.is_some());
    }

    #[tokio::test]
    async fn publish_error_is_captured() {
        let h = harness(Setup {
            references: vec![gov_reference()],
            publish: Err(EntityGraphError::Publish("edit conflict".into())),
            ..Default::default()
        });
        let result = h
            .pipeline
            .run(
                request("https://acme.test", |o| o.should_publish = true),
                &SilentProgress,
            )
            .await;

        let outcome = result.publish_outcome.as_ref().expect("captured outcome");
        assert!(!outcome.succeeded);
        assert!(outcome.error.as_deref().unwrap().contains("edit conflict"));
        assert!(matches!(result.stages.publish.status, StageStatus::Failed { .. }));
        assert!(!result.overall_succeeded);
    }

    #[tokio::test]
    async fn unsuccessful_publish_response_is_kept_verbatim() {
        let rejected = PublishOutcome {
            succeeded: false,
            external_id: None,
            properties_published: 0,
            references_published: 0,
            dry_run: false,
            error: Some("label already in use".into()),
        };
        let h = harness(Setup {
            references: vec![gov_reference()],
            publish: Ok(rejected.clone()),
            ..Default::default()
        });
        let result = h
            .pipeline
            .run(
                request("https://acme.test", |o| o.should_publish = true),
                &SilentProgress,
            )
            .await;

        assert_eq!(result.publish_outcome, Some(rejected));
        assert_eq!(
            result.stages.publish.status,
            StageStatus::Failed {
                message: "label already in use".into()
            }
        );
    }

    #[tokio::test]
    async fn fingerprint_failure_is_not_fatal() {
        let h = harness(Setup {
            fingerprint_fails: true,
            ..Default::default()
        });
        let result = h
            .pipeline
            .run(request("https://acme.test", |_| {}), &SilentProgress)
            .await;

        assert!(matches!(result.stages.fingerprint.status, StageStatus::Failed { .. }));
        assert_eq!(result.stages.entity.status, StageStatus::Succeeded);
        assert!(result.entity.is_some());
        assert!(!result.overall_succeeded);
    }

    #[tokio::test]
    async fn slow_crawl_times_out_and_run_continues() {
        let h = harness(Setup {
            crawl_delay: Duration::from_secs(10),
            ..Default::default()
        });
        let started = Instant::now();
        let result = h
            .pipeline
            .run(
                request("https://acme.test", |o| {
                    o.include_fingerprint = false;
                    o.timeout_budget_ms = 50;
                }),
                &SilentProgress,
            )
            .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(
            result.stages.crawl.status,
            StageStatus::TimedOut { budget_ms: 50 }
        );
        assert_eq!(result.subject.as_ref().unwrap().origin, IdentityOrigin::UrlFallback);
        assert!(result.entity.is_some());
    }

    #[tokio::test]
    async fn zero_budget_times_out_without_calling_crawler() {
        let h = harness(Setup::default());
        let result = h
            .pipeline
            .run(
                request("https://acme.test", |o| o.timeout_budget_ms = 0),
                &SilentProgress,
            )
            .await;

        assert_eq!(h.crawler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.stages.crawl.status, StageStatus::TimedOut { budget_ms: 0 });
        assert_eq!(
            result.stages.fingerprint.status,
            StageStatus::TimedOut { budget_ms: 0 }
        );
    }

    #[tokio::test]
    async fn slow_publish_stage_times_out() {
        let h = harness(Setup {
            references: vec![gov_reference()],
            publish_timeout: Duration::ZERO,
            ..Default::default()
        });
        let result = h
            .pipeline
            .run(
                request("https://acme.test", |o| o.should_publish = true),
                &SilentProgress,
            )
            .await;

        assert!(matches!(result.stages.publish.status, StageStatus::TimedOut { .. }));
        assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 0);
        assert!(result.publish_outcome.is_none());
    }

    #[tokio::test]
    async fn no_fallback_skips_downstream_stages() {
        let h = harness(Setup {
            crawl: CrawlOutcome::failure("HTTP 503"),
            ..Default::default()
        });
        let result = h
            .pipeline
            .run(
                request("https://acme.test", |o| {
                    o.allow_fallback_data = false;
                    o.should_publish = true;
                }),
                &SilentProgress,
            )
            .await;

        let missing = StageStatus::Skipped {
            reason: SkipReason::MissingUpstream,
        };
        assert!(result.subject.is_none());
        assert!(result.entity.is_none());
        assert_eq!(result.stages.fingerprint.status, missing);
        assert_eq!(result.stages.entity.status, missing);
        assert_eq!(result.stages.publish.status, missing);
        assert_eq!(h.fingerprinter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 0);
        assert!(!result.overall_succeeded);
    }

    #[tokio::test]
    async fn unknown_location_placeholders_are_dropped() {
        let mut source = acme_source();
        source.address.city = Some("unknown".into());
        source.address.state = Some("Unknown".into());
        source.address.country = None;
        let h = harness(Setup {
            crawl: CrawlOutcome::success(source),
            ..Default::default()
        });
        let result = h
            .pipeline
            .run(request("https://acme.test", |_| {}), &SilentProgress)
            .await;

        assert!(result.subject.as_ref().unwrap().location.is_none());
        let seen = h.fingerprinter.seen.lock().unwrap();
        assert!(seen[0].location.is_none());
        assert_eq!(seen[0].category, "dentist");
    }

    // -- Progress ------------------------------------------------------------

    #[tokio::test]
    async fn progress_is_monotonic_and_terminal() {
        let h = harness(Setup {
            references: vec![gov_reference()],
            ..Default::default()
        });
        let events = Mutex::new(Vec::<ProgressEvent>::new());
        let observer = |e: &ProgressEvent| events.lock().unwrap().push(e.clone());

        let result = h
            .pipeline
            .run(
                request("https://acme.test", |o| o.should_publish = true),
                &observer,
            )
            .await;
        assert!(result.overall_succeeded);

        let events = events.into_inner().unwrap();
        let percents: Vec<u8> = events.iter().map(|e| e.percent_complete).collect();
        assert_eq!(percents, vec![10, 40, 45, 60, 70, 85, 90, 100]);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(events.last().unwrap().stage, StageName::Completed);
    }

    #[tokio::test]
    async fn failed_run_ends_with_failed_event() {
        let h = harness(Setup {
            crawl: CrawlOutcome::failure("boom"),
            ..Default::default()
        });
        let last = Mutex::new(None);
        let observer = |e: &ProgressEvent| *last.lock().unwrap() = Some(e.clone());

        h.pipeline
            .run(request("https://acme.test", |_| {}), &observer)
            .await;

        let last = last.into_inner().unwrap().expect("events emitted");
        assert_eq!(last.stage, StageName::Failed);
        assert_eq!(last.percent_complete, 100);
    }

    #[tokio::test]
    async fn observer_panic_becomes_terminal_result() {
        let h = harness(Setup::default());
        let seen = Mutex::new(Vec::new());
        let observer = |e: &ProgressEvent| {
            seen.lock().unwrap_or_else(|p| p.into_inner()).push((e.stage, e.percent_complete));
            if e.percent_complete == 60 {
                panic!("observer exploded");
            }
        };

        let result = h
            .pipeline
            .run(request("https://acme.test", |_| {}), &observer)
            .await;

        assert!(!result.overall_succeeded);
        let error = result.terminal_error.expect("terminal error");
        assert!(error.contains("observer exploded"), "{error}");
        assert!(result.entity.is_none());
        assert_eq!(
            seen.into_inner().unwrap_or_else(|p| p.into_inner()).last(),
            Some(&(StageName::Failed, 100))
        );
    }

    #[tokio::test]
    async fn observer_panicking_on_every_late_event_still_returns() {
        let h = harness(Setup::default());
        let observer = |e: &ProgressEvent| {
            if e.percent_complete >= 60 {
                panic!("observer gave up at {}", e.percent_complete);
            }
        };

        let result = h
            .pipeline
            .run(request("https://acme.test", |_| {}), &observer)
            .await;

        assert!(!result.overall_succeeded);
        assert!(result.terminal_error.expect("terminal error").contains("observer gave up at 60"));
    }

    // -- Helpers -------------------------------------------------------------

    #[test]
    fn budget_split() {
        assert_eq!(split_budget(60_000, true), (36_000, 24_000));
        assert_eq!(split_budget(60_000, false), (60_000, 0));
        assert_eq!(split_budget(1, true), (0, 1));
    }

    #[test]
    fn fallback_names() {
        let name = |u: &str| fallback_name(&Url::parse(u).unwrap());
        assert_eq!(name("https://www.example-clinic.com").as_deref(), Some("Example Clinic"));
        assert_eq!(name("http://joes_pizza.net/menu").as_deref(), Some("Joes Pizza"));
        assert_eq!(name("https://acme.co.uk").as_deref(), Some("Acme"));
    }
}
