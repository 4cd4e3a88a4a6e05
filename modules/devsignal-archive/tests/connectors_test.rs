//! Connector behavior against mocked network seams.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use devsignal_archive::testing::{
    memory_store, repo, user, MockGithub, MockPageFetcher, MockProfessionalNetwork,
};
use devsignal_archive::{
    DeepSignalsConnector, PrimaryConnector, PrimaryParams, ProfessionalConnector,
    ProfessionalParams, RetryPolicy, SourceConnector, WebsiteConnector, WebsiteParams,
};
use devsignal_common::{
    CandidateUrl, FetchError, Identity, PrimaryProfile, ProfessionalProfile, SourcePayload,
    UrlOrigin, Verdict, WebsiteCrawl,
};
use github_client::{Contributor, Gist, Organization, Release, SocialAccount, Workflow};

fn ada() -> Identity {
    Identity::parse("ada").unwrap()
}

fn primary(payload: SourcePayload) -> PrimaryProfile {
    match payload {
        SourcePayload::Primary(p) => p,
        other => panic!("expected primary payload, got {other:?}"),
    }
}

fn crawl(payload: SourcePayload) -> WebsiteCrawl {
    match payload {
        SourcePayload::Website(c) => c,
        other => panic!("expected website payload, got {other:?}"),
    }
}

fn candidate(url: &str, verdict: Verdict) -> CandidateUrl {
    CandidateUrl {
        raw: url.to_string(),
        url: url.to_string(),
        origin: UrlOrigin::DeclaredLink,
        verdict,
        reason: None,
    }
}

// ---------------------------------------------------------------------------
// Primary
// ---------------------------------------------------------------------------

#[tokio::test]
async fn primary_skips_forks_and_caps_repositories() {
    let mut fork = repo("ada", "forked", 500, 1);
    fork.fork = true;
    let api = Arc::new(
        MockGithub::new()
            .with_user(user("ada"))
            .with_repos(vec![
                fork,
                repo("ada", "engine", 40, 3),
                repo("ada", "notes", 2, 10),
                repo("ada", "old", 0, 400),
            ])
            .with_languages("ada/engine", &[("Rust", 9000), ("Python", 1000)]),
    );
    let (cache, _) = memory_store(false);
    let connector = PrimaryConnector::new(api, cache);

    let params = PrimaryParams {
        max_repos: 2,
        fetch_readme: false,
        ..Default::default()
    };
    let profile = primary(connector.fetch(&ada(), &params).await.unwrap().payload);

    let names: Vec<&str> = profile.repositories.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["engine", "notes"]);
    assert_eq!(profile.repositories[0].languages["Rust"], 9000);
    assert!(profile.profile_readme.is_none());
}

#[tokio::test]
async fn primary_falls_back_to_primary_language_when_breakdown_fails() {
    let mut engine = repo("ada", "engine", 40, 3);
    engine.language = Some("Go".to_string());
    engine.size = 12;
    let api = Arc::new(
        MockGithub::new()
            .with_user(user("ada"))
            .with_repos(vec![engine])
            .failing_languages("ada/engine"),
    );
    let (cache, _) = memory_store(false);
    let connector = PrimaryConnector::new(api, cache);

    let profile = primary(
        connector
            .fetch(&ada(), &PrimaryParams::default())
            .await
            .unwrap()
            .payload,
    );
    let languages = &profile.repositories[0].languages;
    assert_eq!(languages.len(), 1);
    assert_eq!(languages["Go"], 12 * 1024);
}

#[tokio::test]
async fn primary_not_found_is_not_retried() {
    let api = Arc::new(MockGithub::new());
    let (cache, _) = memory_store(false);
    let connector =
        PrimaryConnector::new(api.clone(), cache).with_retry_policy(RetryPolicy::immediate(3));

    let err = connector
        .fetch(&ada(), &PrimaryParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::NotFound(_)));
    assert_eq!(api.user_call_count(), 1);
}

#[tokio::test]
async fn primary_retries_transient_failures_then_caches() {
    let api = Arc::new(MockGithub::new().with_user(user("ada")).flaky_user(2));
    let (cache, _) = memory_store(false);
    let connector =
        PrimaryConnector::new(api.clone(), cache).with_retry_policy(RetryPolicy::immediate(3));

    connector
        .fetch(&ada(), &PrimaryParams::default())
        .await
        .unwrap();
    assert_eq!(api.user_call_count(), 3);

    connector
        .fetch(&ada(), &PrimaryParams::default())
        .await
        .unwrap();
    assert_eq!(api.user_call_count(), 3, "second run is a cache hit");
}

#[tokio::test]
async fn primary_gives_up_after_bounded_attempts() {
    let api = Arc::new(MockGithub::new().with_user(user("ada")).flaky_user(10));
    let (cache, _) = memory_store(false);
    let connector =
        PrimaryConnector::new(api.clone(), cache).with_retry_policy(RetryPolicy::immediate(3));

    let err = connector
        .fetch(&ada(), &PrimaryParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Network(_)));
    assert_eq!(api.user_call_count(), 3);
}

#[tokio::test]
async fn primary_collects_organizations_gists_and_social_accounts() {
    let mut profile_user = user("ada");
    profile_user.twitter_username = Some("ada_l".to_string());
    profile_user.blog = Some("https://www.linkedin.com/in/ada-lovelace/".to_string());
    let gist: Gist = serde_json::from_str(
        r#"{"id":"g1","description":"","public":true,"html_url":"https://gist.github.com/g1",
            "files":{"a.rs":{"language":"Rust"},"b.rs":{"language":"Rust"},"c.py":{"language":"Python"}}}"#,
    )
    .unwrap();
    let api = Arc::new(
        MockGithub::new()
            .with_user(profile_user)
            .with_organizations(vec![Organization {
                login: "rust-lang".to_string(),
                description: Some("".to_string()),
            }])
            .with_gists(vec![gist])
            .with_social_accounts(vec![
                SocialAccount {
                    provider: "twitter".to_string(),
                    url: "https://twitter.com/ada_l".to_string(),
                },
                SocialAccount {
                    provider: "mastodon".to_string(),
                    url: "https://hachyderm.io/@ada".to_string(),
                },
            ]),
    );
    let (cache, _) = memory_store(false);
    let connector = PrimaryConnector::new(api, cache);

    let profile = primary(
        connector
            .fetch(&ada(), &PrimaryParams::default())
            .await
            .unwrap()
            .payload,
    );

    assert_eq!(profile.organizations[0].login, "rust-lang");
    assert_eq!(profile.organizations[0].description, None);
    assert_eq!(profile.gists[0].files_count, 3);
    assert_eq!(profile.gists[0].languages, vec!["Python", "Rust"]);

    let platforms: Vec<&str> = profile
        .social_accounts
        .iter()
        .map(|l| l.platform.as_str())
        .collect();
    // The declared handle duplicates the linked Twitter account.
    assert_eq!(platforms, vec!["Twitter", "Mastodon", "LinkedIn"]);
    assert_eq!(profile.social_accounts[0].username.as_deref(), Some("ada_l"));
    assert_eq!(
        profile.social_accounts[2].username.as_deref(),
        Some("ada-lovelace")
    );
}

#[tokio::test]
async fn primary_repository_details_need_a_token() {
    let release: Release = serde_json::from_str(
        r#"{"tag_name":"v0.3.0","name":"","prerelease":false,"draft":false,
            "assets":[{"download_count":7},{"download_count":5}]}"#,
    )
    .unwrap();
    let build = || {
        MockGithub::new()
            .with_user(user("ada"))
            .with_repos(vec![repo("ada", "engine", 40, 3)])
            .with_contributors(
                "ada/engine",
                vec![
                    Contributor {
                        login: Some("ada".to_string()),
                        contributions: 120,
                    },
                    Contributor {
                        login: None,
                        contributions: 4,
                    },
                ],
            )
            .with_releases("ada/engine", vec![release.clone()])
            .with_workflows(
                "ada/engine",
                vec![Workflow {
                    name: "CI".to_string(),
                    state: "active".to_string(),
                    path: ".github/workflows/ci.yml".to_string(),
                }],
            )
            .with_file("ada/engine", ".github/SECURITY.md")
    };

    let anonymous = Arc::new(build());
    let (cache, _) = memory_store(false);
    let profile = primary(
        PrimaryConnector::new(anonymous, cache)
            .fetch(&ada(), &PrimaryParams::default())
            .await
            .unwrap()
            .payload,
    );
    let engine = &profile.repositories[0];
    assert!(engine.contributors.is_empty());
    assert!(engine.releases.is_empty());
    assert!(!engine.has_security_policy);

    let authed = Arc::new(build().with_token());
    let (cache, _) = memory_store(false);
    let profile = primary(
        PrimaryConnector::new(authed, cache)
            .fetch(&ada(), &PrimaryParams::default())
            .await
            .unwrap()
            .payload,
    );
    let engine = &profile.repositories[0];
    assert_eq!(engine.contributors.len(), 1, "anonymous contributors are dropped");
    assert_eq!(engine.contributors[0].contributions, 120);
    assert_eq!(engine.releases[0].name, "v0.3.0");
    assert_eq!(engine.releases[0].download_count, 12);
    assert_eq!(engine.total_downloads(), 12);
    assert_eq!(engine.workflows[0].name, "CI");
    assert!(engine.has_security_policy);
}

#[tokio::test]
async fn primary_extended_failures_are_not_fatal() {
    let api = Arc::new(
        MockGithub::new()
            .with_user(user("ada"))
            .with_repos(vec![repo("ada", "engine", 40, 3)])
            .with_token()
            .failing_extended(),
    );
    let (cache, _) = memory_store(false);
    let connector = PrimaryConnector::new(api.clone(), cache);

    let profile = primary(
        connector
            .fetch(&ada(), &PrimaryParams::default())
            .await
            .unwrap()
            .payload,
    );
    assert_eq!(profile.repositories.len(), 1);
    assert!(profile.organizations.is_empty());
    assert!(profile.repositories[0].workflows.is_empty());
    assert!(api.extended_call_count() > 0);
}

#[tokio::test]
async fn primary_skips_extended_calls_when_disabled() {
    let api = Arc::new(
        MockGithub::new()
            .with_user(user("ada"))
            .with_repos(vec![repo("ada", "engine", 40, 3)])
            .with_token(),
    );
    let (cache, _) = memory_store(false);
    let params = PrimaryParams {
        extended: false,
        ..Default::default()
    };

    PrimaryConnector::new(api.clone(), cache)
        .fetch(&ada(), &params)
        .await
        .unwrap();
    assert_eq!(api.extended_call_count(), 0);
}

// ---------------------------------------------------------------------------
// Deep signals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deep_signals_require_a_token() {
    let api = Arc::new(MockGithub::new().with_user(user("ada")));
    let (cache, _) = memory_store(false);
    let connector = DeepSignalsConnector::new(api.clone(), cache);

    let err = connector.fetch(&ada(), &()).await.unwrap_err();
    assert!(matches!(err, FetchError::Auth(_)));
    assert_eq!(api.signal_call_count(), 0);
}

#[tokio::test]
async fn deep_signals_are_summarized_and_cached() {
    let api = Arc::new(MockGithub::new().with_token().with_signals_json(
        r#"{ "user": {
            "hasSponsorsListing": false,
            "issues": { "nodes": [ { "state": "OPEN", "author": { "login": "ada" }, "comments": null } ] }
        } }"#,
    ));
    let (cache, _) = memory_store(false);
    let connector = DeepSignalsConnector::new(api.clone(), cache);

    for _ in 0..2 {
        let raw = connector.fetch(&ada(), &()).await.unwrap();
        match raw.payload {
            SourcePayload::DeepSignals(s) => assert_eq!(s.issues.opened, 1),
            other => panic!("unexpected payload {other:?}"),
        }
    }
    assert_eq!(api.signal_calls.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Website
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_failing_site_does_not_sink_the_others() {
    let fetcher = Arc::new(
        MockPageFetcher::new()
            .on_page(
                "https://ada.dev",
                "# Ada Lovelace\n\nEngineer in London\n\n## Skills\n\nRust, Go\n",
            )
            .on_failure(
                "https://broken.example.org",
                FetchError::Network("connection refused".into()),
            ),
    );
    let (cache, _) = memory_store(false);
    let connector =
        WebsiteConnector::new(fetcher.clone(), cache).with_retry_policy(RetryPolicy::immediate(3));

    let params = WebsiteParams {
        targets: vec![
            candidate("https://ada.dev", Verdict::Personal),
            candidate("https://broken.example.org", Verdict::Personal),
            candidate("https://www.codewars.com/users/ada", Verdict::PlatformExcluded),
        ],
        max_sites: 3,
    };
    let result = crawl(connector.fetch(&ada(), &params).await.unwrap().payload);

    assert_eq!(result.sites.len(), 1);
    assert_eq!(result.sites[0].name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].url, "https://broken.example.org");
    assert!(!fetcher
        .calls()
        .iter()
        .any(|u| u.contains("codewars")));
    let broken_attempts = fetcher
        .calls()
        .iter()
        .filter(|u| u.contains("broken"))
        .count();
    assert_eq!(broken_attempts, 3, "network failures retried up to the bound");
}

#[tokio::test]
async fn rate_limited_site_is_retried() {
    let fetcher = Arc::new(
        MockPageFetcher::new()
            .on_page("https://ada.dev", "# Ada Lovelace\n\nCompiler engineer\n")
            .throttled("https://ada.dev", 1),
    );
    let (cache, _) = memory_store(false);
    let connector =
        WebsiteConnector::new(fetcher.clone(), cache).with_retry_policy(RetryPolicy::immediate(3));

    let params = WebsiteParams {
        targets: vec![candidate("https://ada.dev", Verdict::Personal)],
        max_sites: 3,
    };
    let result = crawl(connector.fetch(&ada(), &params).await.unwrap().payload);

    assert_eq!(fetcher.calls().len(), 2);
    assert!(result.failures.is_empty());
    assert_eq!(result.sites[0].headline.as_deref(), Some("Compiler engineer"));
}

#[tokio::test]
async fn slow_site_times_out_individually() {
    let fetcher = Arc::new(
        MockPageFetcher::new()
            .on_page("https://ada.dev", "# Ada\n")
            .on_page("https://slow.dev", "# Slow\n")
            .slow("https://slow.dev", Duration::from_secs(5)),
    );
    let (cache, _) = memory_store(false);
    let connector = WebsiteConnector::new(fetcher, cache)
        .with_crawl_timeout(Duration::from_millis(50))
        .with_retry_policy(RetryPolicy::none());

    let params = WebsiteParams {
        targets: vec![
            candidate("https://ada.dev", Verdict::Personal),
            candidate("https://slow.dev", Verdict::Personal),
        ],
        max_sites: 5,
    };
    let result = crawl(connector.fetch(&ada(), &params).await.unwrap().payload);

    assert_eq!(result.sites.len(), 1);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].url, "https://slow.dev");
}

#[tokio::test]
async fn site_count_is_capped() {
    let mut fetcher = MockPageFetcher::new();
    let mut targets = Vec::new();
    for i in 0..8 {
        let url = format!("https://site{i}.dev");
        fetcher = fetcher.on_page(&url, "# Site\n");
        targets.push(candidate(&url, Verdict::Personal));
    }
    let fetcher = Arc::new(fetcher);
    let (cache, _) = memory_store(false);
    let connector = WebsiteConnector::new(fetcher.clone(), cache);

    let params = WebsiteParams {
        targets,
        max_sites: 20,
    };
    let result = crawl(connector.fetch(&ada(), &params).await.unwrap().payload);

    assert_eq!(result.sites.len(), 5);
    assert_eq!(fetcher.calls().len(), 5);
}

// ---------------------------------------------------------------------------
// Professional network
// ---------------------------------------------------------------------------

#[tokio::test]
async fn professional_reference_is_normalized_before_fetching() {
    let api = Arc::new(MockProfessionalNetwork::new().on_profile(
        "https://linkedin.com/in/ada-lovelace",
        ProfessionalProfile {
            profile_url: "https://linkedin.com/in/ada-lovelace".into(),
            full_name: Some("Ada Lovelace".into()),
            ..Default::default()
        },
    ));
    let (cache, _) = memory_store(false);
    let connector = ProfessionalConnector::new(api.clone(), cache);

    for reference in ["in/ada-lovelace", "https://www.linkedin.com/in/ada-lovelace/"] {
        let params = ProfessionalParams {
            reference: reference.to_string(),
        };
        let raw = connector.fetch(&ada(), &params).await.unwrap();
        match raw.payload {
            SourcePayload::ProfessionalNetwork(p) => {
                assert_eq!(p.full_name.as_deref(), Some("Ada Lovelace"))
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
    assert_eq!(api.call_count(), 1, "both forms share one cache entry");
}

#[tokio::test]
async fn rate_limited_profile_is_retried() {
    let url = "https://linkedin.com/in/ada-lovelace";
    let api = Arc::new(
        MockProfessionalNetwork::new()
            .on_profile(
                url,
                ProfessionalProfile {
                    profile_url: url.into(),
                    headline: Some("Compiler engineer".into()),
                    ..Default::default()
                },
            )
            .throttled(url, 1),
    );
    let (cache, _) = memory_store(false);
    let connector =
        ProfessionalConnector::new(api.clone(), cache).with_retry_policy(RetryPolicy::immediate(3));

    let params = ProfessionalParams {
        reference: "ada-lovelace".to_string(),
    };
    let raw = connector.fetch(&ada(), &params).await.unwrap();

    assert_eq!(api.call_count(), 2);
    match raw.payload {
        SourcePayload::ProfessionalNetwork(p) => {
            assert_eq!(p.headline.as_deref(), Some("Compiler engineer"))
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[tokio::test]
async fn unrecognized_professional_reference_is_rejected() {
    let api = Arc::new(MockProfessionalNetwork::new());
    let (cache, _) = memory_store(false);
    let connector = ProfessionalConnector::new(api.clone(), cache);

    let params = ProfessionalParams {
        reference: "not a profile at all".to_string(),
    };
    let err = connector.fetch(&ada(), &params).await.unwrap_err();
    assert!(matches!(err, FetchError::Parse(_)));
    assert_eq!(api.call_count(), 0);
}
