// One run: mandatory primary fetch, then the requested optional sources
// concurrently under a shared worker limit, then merge and score.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use devsignal_archive::discovery::{
    crawl_targets, discover_candidates, discover_professional_references,
    normalize_professional_reference,
};
use devsignal_archive::{
    CacheStore, DeepSignalsConnector, GithubApi, PageFetcher, PrimaryConnector, PrimaryParams,
    ProfessionalConnector, ProfessionalNetworkApi, ProfessionalParams, RetryPolicy,
    SourceConnector, WebsiteConnector, WebsiteParams,
};
use devsignal_common::config::Config;
use devsignal_common::{
    CandidateUrl, DeepSignals, FailureCategory, FetchError, Identity, InvalidIdentity,
    PrimaryProfile, ProfessionalProfile, ProfileReport, RawResult, SourcePayload, SourceTag,
    WebsiteCrawl,
};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::merge::{merge, MergeInput, SourceOutcome};
use crate::scoring::score;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid identity: {0}")]
    InvalidIdentity(#[from] InvalidIdentity),

    #[error("primary profile unavailable: {message}")]
    Fatal {
        category: FailureCategory,
        message: String,
    },
}

impl PipelineError {
    fn fatal(err: FetchError) -> Self {
        PipelineError::Fatal {
            category: err.category(),
            message: err.to_string(),
        }
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::InvalidIdentity(_) => 1,
            PipelineError::Fatal { category, .. } => match category {
                FailureCategory::Auth => 2,
                FailureCategory::NotFound => 3,
                FailureCategory::RateLimit => 4,
                FailureCategory::Network | FailureCategory::Timeout => 5,
                FailureCategory::Parse => 1,
            },
        }
    }
}

/// Which optional sources to run, plus manual overrides for discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub deep_signals: bool,
    pub enrich_websites: bool,
    pub enrich_professional: bool,
    /// Website URLs to crawl ahead of anything discovered.
    pub manual_websites: Vec<String>,
    /// Professional profile to fetch instead of the discovered one.
    pub professional_reference: Option<String>,
}

impl RunOptions {
    pub fn full_profile() -> Self {
        Self {
            deep_signals: true,
            enrich_websites: true,
            enrich_professional: true,
            ..Default::default()
        }
    }
}

/// Network backends for each source. The professional network is optional
/// because it needs its own credentials.
pub struct Sources {
    pub github: Arc<dyn GithubApi>,
    pub pages: Arc<dyn PageFetcher>,
    pub professional: Option<Arc<dyn ProfessionalNetworkApi>>,
}

pub struct Pipeline {
    config: Config,
    primary: PrimaryConnector,
    deep_signals: DeepSignalsConnector,
    website: WebsiteConnector,
    professional: Option<ProfessionalConnector>,
    workers: Semaphore,
    crawl_timeout: Duration,
}

impl Pipeline {
    pub fn new(config: Config, sources: Sources, cache: Arc<CacheStore>) -> Self {
        let crawl_timeout = Duration::from_secs(config.scraping.crawl_timeout_secs);
        let workers = Semaphore::new(config.scraping.effective_worker_limit());

        Self {
            primary: PrimaryConnector::new(sources.github.clone(), cache.clone()),
            deep_signals: DeepSignalsConnector::new(sources.github, cache.clone()),
            website: WebsiteConnector::new(sources.pages, cache.clone())
                .with_crawl_timeout(crawl_timeout),
            professional: sources
                .professional
                .map(|api| ProfessionalConnector::new(api, cache)),
            workers,
            crawl_timeout,
            config,
        }
    }

    /// Replace the retry policy of every connector.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.primary = self.primary.with_retry_policy(retry);
        self.deep_signals = self.deep_signals.with_retry_policy(retry);
        self.website = self.website.with_retry_policy(retry);
        self.professional = self
            .professional
            .map(|connector| connector.with_retry_policy(retry));
        self
    }

    pub async fn run(&self, raw_identity: &str, options: &RunOptions) -> Result<ProfileReport, PipelineError> {
        let identity = Identity::parse(raw_identity)?;
        info!(identity = %identity, ?options, "Run started");

        let primary_params = PrimaryParams {
            max_repos: self.config.github.max_repos,
            fetch_readme: self.config.github.fetch_readme,
            extended: self.config.github.fetch_extended,
        };
        let raw = self
            .primary
            .fetch(&identity, &primary_params)
            .await
            .map_err(PipelineError::fatal)?;
        let fetched_at = raw.fetched_at;
        let SourcePayload::Primary(profile) = raw.payload else {
            return Err(PipelineError::fatal(FetchError::Parse(
                "primary connector returned a foreign payload".to_string(),
            )));
        };

        let candidate_urls = discover_candidates(&profile, &options.manual_websites);
        let professional_references = professional_references(&profile, options);

        let (deep_signals, website, professional) = futures::join!(
            self.deep_signals_outcome(&identity, options),
            self.website_outcome(&identity, options, &candidate_urls),
            self.professional_outcome(&identity, options, &professional_references),
        );

        let aggregate = merge(
            MergeInput {
                identity,
                primary: profile,
                fetched_at,
                candidate_urls,
                professional_references,
                deep_signals,
                website,
                professional,
            },
            &self.config,
        );
        let score = score(&aggregate, &self.config.scoring);

        info!(
            identity = %aggregate.identity,
            activity_score = score.activity_score,
            archetype = %score.archetype,
            "Run finished"
        );
        Ok(ProfileReport { aggregate, score })
    }

    async fn deep_signals_outcome(
        &self,
        identity: &Identity,
        options: &RunOptions,
    ) -> SourceOutcome<DeepSignals> {
        if !options.deep_signals {
            return SourceOutcome::NotRequested;
        }
        let result = self.bounded(self.deep_signals.fetch(identity, &())).await;
        into_outcome(SourceTag::DeepSignals, result, |payload| match payload {
            SourcePayload::DeepSignals(signals) => Some(signals),
            _ => None,
        })
    }

    async fn website_outcome(
        &self,
        identity: &Identity,
        options: &RunOptions,
        candidates: &[CandidateUrl],
    ) -> SourceOutcome<WebsiteCrawl> {
        if !options.enrich_websites {
            return SourceOutcome::NotRequested;
        }
        let max_sites = self.config.scraping.effective_max_websites();
        let targets = crawl_targets(candidates, max_sites);
        if targets.is_empty() {
            info!(identity = %identity, candidates = candidates.len(), "No crawlable website");
            return SourceOutcome::NothingToFetch;
        }

        // Each URL carries its own crawl timeout inside the connector.
        let params = WebsiteParams { targets, max_sites };
        let result = self.bounded(self.website.fetch(identity, &params)).await;
        into_outcome(SourceTag::Website, result, |payload| match payload {
            SourcePayload::Website(crawl) => Some(crawl),
            _ => None,
        })
    }

    async fn professional_outcome(
        &self,
        identity: &Identity,
        options: &RunOptions,
        references: &[String],
    ) -> SourceOutcome<ProfessionalProfile> {
        if !options.enrich_professional {
            return SourceOutcome::NotRequested;
        }
        let Some(connector) = &self.professional else {
            return SourceOutcome::Failed("APIFY_API_KEY not set".to_string());
        };
        let Some(reference) = references.first() else {
            info!(identity = %identity, "No professional profile reference found");
            return SourceOutcome::NothingToFetch;
        };

        let params = ProfessionalParams {
            reference: reference.clone(),
        };
        let timeout = self.crawl_timeout;
        let result = self
            .bounded(async {
                tokio::time::timeout(timeout, connector.fetch(identity, &params))
                    .await
                    .unwrap_or_else(|_| {
                        Err(FetchError::Timeout(format!(
                            "professional profile not fetched within {timeout:?}"
                        )))
                    })
            })
            .await;
        into_outcome(SourceTag::ProfessionalNetwork, result, |payload| match payload {
            SourcePayload::ProfessionalNetwork(profile) => Some(profile),
            _ => None,
        })
    }

    /// Run `fut` while holding one worker permit.
    async fn bounded<F: Future>(&self, fut: F) -> F::Output {
        let _permit = self.workers.acquire().await.ok();
        fut.await
    }
}

/// Manual override first, then discovered references, deduplicated.
fn professional_references(
    profile: &PrimaryProfile,
    options: &RunOptions,
) -> Vec<String> {
    let mut references = Vec::new();
    if let Some(manual) = &options.professional_reference {
        references.push(normalize_professional_reference(manual).unwrap_or_else(|| manual.clone()));
    }
    for reference in discover_professional_references(profile) {
        if !references.contains(&reference) {
            references.push(reference);
        }
    }
    references
}

fn into_outcome<T>(
    source: SourceTag,
    result: Result<RawResult, FetchError>,
    extract: impl FnOnce(SourcePayload) -> Option<T>,
) -> SourceOutcome<T> {
    match result {
        Ok(raw) => match extract(raw.payload) {
            Some(value) => SourceOutcome::Fetched(value),
            None => SourceOutcome::Failed(format!("unexpected payload for {source}")),
        },
        Err(e) => {
            warn!(source = %source, error = %e, "Optional source degraded");
            SourceOutcome::Failed(e.to_string())
        }
    }
}
