//! End-to-end runs against mocked sources: primary-only profiles, excluded links,
//! website enrichment, cached reruns, and fatal primary failures.

use std::sync::Arc;
use std::time::Duration;

use devsignal_archive::testing::{
    memory_store, repo, test_now, user, InFlightGauge, MockGithub, MockPageFetcher,
    MockProfessionalNetwork,
};
use devsignal_archive::{
    CacheStore, FixedClock, FsStorage, ProfessionalNetworkApi, RetryPolicy,
};
use devsignal_common::config::{Config, ScrapingConfig};
use devsignal_common::{
    Archetype, Consistency, FailureCategory, FetchError, Level, ProfessionalProfile,
    SectionStatus, SourceTag, Verdict,
};
use devsignal_engine::correlation::BIO_VS_WEBSITE_HEADLINE;
use devsignal_engine::{Pipeline, PipelineError, RunOptions, Sources};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    github: Arc<MockGithub>,
    pages: Arc<MockPageFetcher>,
    professional: Option<Arc<MockProfessionalNetwork>>,
}

impl Harness {
    fn new(github: MockGithub) -> Self {
        Self {
            github: Arc::new(github),
            pages: Arc::new(MockPageFetcher::new()),
            professional: None,
        }
    }

    fn with_pages(mut self, pages: MockPageFetcher) -> Self {
        self.pages = Arc::new(pages);
        self
    }

    fn with_professional(mut self, network: MockProfessionalNetwork) -> Self {
        self.professional = Some(Arc::new(network));
        self
    }

    fn pipeline(&self, cache: Arc<CacheStore>) -> Pipeline {
        self.pipeline_with(Config::default(), cache)
    }

    fn pipeline_with(&self, config: Config, cache: Arc<CacheStore>) -> Pipeline {
        Pipeline::new(
            config,
            Sources {
                github: self.github.clone(),
                pages: self.pages.clone(),
                professional: self
                    .professional
                    .clone()
                    .map(|p| p as Arc<dyn ProfessionalNetworkApi>),
            },
            cache,
        )
        .with_retry_policy(RetryPolicy::none())
    }
}

const ADA_SITE: &str = "\
# Ada Lovelace

Compiler engineer

## Skills

Rust, OCaml, LLVM

## Experience

- Staff Engineer, Acme (2019-present)
- Engineer, Initech (2015-2019)
";

fn ada_with_site() -> MockGithub {
    let mut ada = user("ada");
    ada.bio = Some("Compiler engineer at Acme".into());
    ada.blog = Some("https://ada.dev".into());
    MockGithub::new()
        .with_user(ada)
        .with_repos(vec![repo("ada", "compiler", 30, 5), repo("ada", "notes", 1, 200)])
        .with_languages("ada/compiler", &[("Rust", 80_000), ("C", 5_000)])
        .with_languages("ada/notes", &[("Markdown", 1_000)])
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zero_repos_and_no_optional_sources() {
    let harness = Harness::new(MockGithub::new().with_user(user("newcomer")));
    let (cache, _) = memory_store(false);

    let report = harness
        .pipeline(cache)
        .run("newcomer", &RunOptions::default())
        .await
        .unwrap();

    let aggregate = &report.aggregate;
    assert!(aggregate.repositories.is_empty());
    assert!(aggregate.languages.is_empty());
    assert_eq!(aggregate.status(SourceTag::Primary), SectionStatus::Present);
    for source in [
        SourceTag::DeepSignals,
        SourceTag::Website,
        SourceTag::ProfessionalNetwork,
    ] {
        assert_eq!(aggregate.status(source), SectionStatus::NotRequested);
    }

    let score = &report.score;
    assert_eq!(score.activity_score, 0);
    assert_eq!(score.impact, Level::Low);
    assert_eq!(score.recent_activity, Level::Low);
    assert_eq!(score.archetype, Archetype::EmergingDeveloper);
}

#[tokio::test]
async fn code_challenge_link_is_excluded_and_run_succeeds() {
    let mut coder = user("coder");
    coder.bio = Some("Training daily on codewars.com.".into());
    let harness = Harness::new(MockGithub::new().with_user(coder));
    let (cache, _) = memory_store(false);

    let options = RunOptions {
        enrich_websites: true,
        ..Default::default()
    };
    let report = harness.pipeline(cache).run("coder", &options).await.unwrap();

    let candidates = &report.aggregate.candidate_urls;
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].verdict, Verdict::PlatformExcluded);
    assert!(report.aggregate.website.sites.is_empty());
    assert_eq!(
        report.aggregate.status(SourceTag::Website),
        SectionStatus::Empty
    );
    assert!(harness.pages.calls().is_empty(), "excluded sites are never crawled");
}

#[tokio::test]
async fn personal_site_populates_website_section() {
    let harness = Harness::new(ada_with_site())
        .with_pages(MockPageFetcher::new().on_page("https://ada.dev", ADA_SITE));
    let (cache, _) = memory_store(false);

    let options = RunOptions {
        enrich_websites: true,
        ..Default::default()
    };
    let report = harness.pipeline(cache).run("ada", &options).await.unwrap();
    let aggregate = &report.aggregate;

    assert_eq!(harness.pages.calls(), vec!["https://ada.dev".to_string()]);
    assert_eq!(aggregate.status(SourceTag::Website), SectionStatus::Present);
    assert!(aggregate.website.skills.contains(&"Rust".to_string()));
    assert_eq!(aggregate.website.sites[0].experience.len(), 2);

    let check = aggregate.correlation.get(BIO_VS_WEBSITE_HEADLINE).unwrap();
    assert_eq!(check.outcome, Consistency::Consistent);
}

#[tokio::test]
async fn two_runs_within_ttl_are_identical() {
    let harness = Harness::new(ada_with_site().with_token().with_signals_json(
        r#"{ "user": { "hasSponsorsListing": true } }"#,
    ))
    .with_pages(MockPageFetcher::new().on_page("https://ada.dev", ADA_SITE));
    let (cache, _) = memory_store(false);
    let pipeline = harness.pipeline(cache);
    let options = RunOptions {
        deep_signals: true,
        enrich_websites: true,
        ..Default::default()
    };

    let first = pipeline.run("ada", &options).await.unwrap();
    let second = pipeline.run("ada", &options).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_vec(&first.score).unwrap(),
        serde_json::to_vec(&second.score).unwrap()
    );
    assert_eq!(harness.github.user_call_count(), 1);
    assert_eq!(harness.github.signal_call_count(), 1);
    assert_eq!(harness.pages.calls().len(), 1);
}

#[tokio::test]
async fn rerun_from_disk_cache_matches_first_run() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(ada_with_site());
    let store = || {
        Arc::new(CacheStore::new(
            Arc::new(FsStorage::new(dir.path())),
            Arc::new(FixedClock::new(test_now())),
            false,
        ))
    };

    let first = harness
        .pipeline(store())
        .run("ada", &RunOptions::default())
        .await
        .unwrap();
    let second = harness
        .pipeline(store())
        .run("ada", &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(harness.github.user_call_count(), 1);
}

// ---------------------------------------------------------------------------
// Degradation and fatal failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn optional_failures_degrade_without_aborting() {
    let harness = Harness::new(ada_with_site())
        .with_pages(MockPageFetcher::new().on_failure(
            "https://ada.dev",
            FetchError::Network("connection refused".into()),
        ));
    let (cache, _) = memory_store(false);

    let report = harness
        .pipeline(cache)
        .run("ada", &RunOptions::full_profile())
        .await
        .unwrap();
    let aggregate = &report.aggregate;

    // No token: deep signals skipped. No professional backend configured.
    assert!(matches!(
        aggregate.status(SourceTag::DeepSignals),
        SectionStatus::Degraded { .. }
    ));
    assert!(matches!(
        aggregate.status(SourceTag::Website),
        SectionStatus::Degraded { .. }
    ));
    assert!(matches!(
        aggregate.status(SourceTag::ProfessionalNetwork),
        SectionStatus::Degraded { .. }
    ));
    assert_eq!(aggregate.deep_signals.signals, None);
    assert!(aggregate.website.sites.is_empty());
    assert_eq!(aggregate.repositories.len(), 2);
}

#[tokio::test]
async fn manual_professional_reference_is_fetched() {
    let harness = Harness::new(ada_with_site()).with_professional(
        MockProfessionalNetwork::new().on_profile(
            "https://linkedin.com/in/ada-lovelace",
            ProfessionalProfile {
                profile_url: "https://linkedin.com/in/ada-lovelace".into(),
                full_name: Some("Ada Lovelace".into()),
                headline: Some("Compiler engineer".into()),
                ..Default::default()
            },
        ),
    );
    let (cache, _) = memory_store(false);

    let options = RunOptions {
        enrich_professional: true,
        professional_reference: Some("ada-lovelace".into()),
        ..Default::default()
    };
    let report = harness.pipeline(cache).run("ada", &options).await.unwrap();

    assert_eq!(
        report.aggregate.status(SourceTag::ProfessionalNetwork),
        SectionStatus::Present
    );
    assert_eq!(
        report.aggregate.professional.full_name(),
        Some("Ada Lovelace")
    );
    assert_eq!(
        report.aggregate.professional_references,
        vec!["https://linkedin.com/in/ada-lovelace".to_string()]
    );
}

#[tokio::test]
async fn unknown_identity_is_fatal() {
    let harness = Harness::new(MockGithub::new());
    let (cache, _) = memory_store(false);

    let err = harness
        .pipeline(cache)
        .run("ghost", &RunOptions::full_profile())
        .await
        .unwrap_err();

    match &err {
        PipelineError::Fatal { category, .. } => assert_eq!(*category, FailureCategory::NotFound),
        other => panic!("expected fatal error, got {other:?}"),
    }
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn bad_credentials_are_fatal() {
    let harness = Harness::new(
        MockGithub::new().failing_user(FetchError::Auth("bad credentials".into())),
    );
    let (cache, _) = memory_store(false);

    let err = harness
        .pipeline(cache)
        .run("ada", &RunOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn malformed_identity_is_rejected_before_fetching() {
    let harness = Harness::new(MockGithub::new().with_user(user("ada")));
    let (cache, _) = memory_store(false);

    let err = harness
        .pipeline(cache)
        .run("../../etc/passwd", &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidIdentity(_)));
    assert_eq!(harness.github.user_call_count(), 0);
}

#[tokio::test]
async fn worker_limit_bounds_optional_fetches() {
    let profile_url = "https://linkedin.com/in/ada-lovelace";
    let delay = Duration::from_millis(50);

    for (worker_limit, expected_peak) in [(1, 1), (4, 2)] {
        let gauge = InFlightGauge::new();
        let harness = Harness::new(ada_with_site())
            .with_pages(
                MockPageFetcher::new()
                    .on_page("https://ada.dev", ADA_SITE)
                    .slow("https://ada.dev", delay)
                    .with_gauge(gauge.clone()),
            )
            .with_professional(
                MockProfessionalNetwork::new()
                    .on_profile(
                        profile_url,
                        ProfessionalProfile {
                            profile_url: profile_url.into(),
                            ..Default::default()
                        },
                    )
                    .slow(delay)
                    .with_gauge(gauge.clone()),
            );
        let config = Config {
            scraping: ScrapingConfig {
                worker_limit,
                ..Default::default()
            },
            ..Default::default()
        };
        let (cache, _) = memory_store(false);
        let options = RunOptions {
            enrich_websites: true,
            enrich_professional: true,
            professional_reference: Some("ada-lovelace".into()),
            ..Default::default()
        };

        let report = harness
            .pipeline_with(config, cache)
            .run("ada", &options)
            .await
            .unwrap();

        assert_eq!(
            report.aggregate.status(SourceTag::Website),
            SectionStatus::Present
        );
        assert_eq!(
            gauge.peak(),
            expected_peak,
            "worker_limit {worker_limit} allowed {} concurrent fetches",
            gauge.peak()
        );
    }
}

// ---------------------------------------------------------------------------
// Score properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn activity_score_stays_in_range() {
    let shapes: Vec<Vec<(u32, i64)>> = vec![
        vec![],
        vec![(0, 1000)],
        vec![(5, 1); 3],
        vec![(100_000, 1); 40],
        vec![(u32::MAX, 0); 20],
    ];

    for (i, shape) in shapes.into_iter().enumerate() {
        let repos = shape
            .iter()
            .enumerate()
            .map(|(n, (stars, days))| repo("dev", &format!("r{n}"), *stars, *days))
            .collect();
        let harness = Harness::new(MockGithub::new().with_user(user("dev")).with_repos(repos));
        let (cache, _) = memory_store(false);

        let report = harness
            .pipeline(cache)
            .run("dev", &RunOptions::default())
            .await
            .unwrap();
        assert!(
            report.score.activity_score <= 100,
            "shape {i} scored {}",
            report.score.activity_score
        );
    }
}
