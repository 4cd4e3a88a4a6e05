// Test mocks for the connectors and the pipeline.
//
// Three mocks matching the three network seams:
// - MockGithub (GithubApi): builder-configured user, repositories, languages, signals
//   and the extended organization/gist/release data
// - MockPageFetcher (PageFetcher): HashMap-based URL to markdown
// - MockProfessionalNetwork (ProfessionalNetworkApi): HashMap-based URL to profile
//
// The page and profile mocks can answer 429 a set number of times and report
// into a shared InFlightGauge.
//
// Plus fixture helpers for users, repositories and an in-memory cache store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use devsignal_common::{FetchError, ProfessionalProfile};
use github_client::{
    ContributionSignalsData, Contributor, Gist, Organization, Release, Repository, SocialAccount,
    User, Workflow,
};

use crate::cache::{CacheStore, FixedClock, MemoryStorage};
use crate::fetchers::{GithubApi, PageFetcher, ProfessionalNetworkApi};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A fixed "now" shared by the scenario tests.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn user(login: &str) -> User {
    User {
        login: login.to_string(),
        public_repos: 0,
        created_at: Some(test_now() - chrono::Duration::days(2000)),
        ..Default::default()
    }
}

/// An owned, non-fork repository updated `days_ago` before [`test_now`].
pub fn repo(owner: &str, name: &str, stars: u32, days_ago: i64) -> Repository {
    let updated = test_now() - chrono::Duration::days(days_ago);
    Repository {
        name: name.to_string(),
        full_name: format!("{owner}/{name}"),
        html_url: format!("https://github.com/{owner}/{name}"),
        stargazers_count: stars,
        size: 100,
        created_at: Some(updated - chrono::Duration::days(365)),
        updated_at: Some(updated),
        pushed_at: Some(updated),
        ..Default::default()
    }
}

/// In-memory store pinned to [`test_now`]. The clock is returned for advancing.
pub fn memory_store(bypass: bool) -> (Arc<CacheStore>, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(test_now()));
    let store = CacheStore::new(Arc::new(MemoryStorage::new()), clock.clone(), bypass);
    (Arc::new(store), clock)
}

// ---------------------------------------------------------------------------
// MockGithub
// ---------------------------------------------------------------------------

/// Builder-configured primary platform. Unconfigured users are `NotFound`.
/// Every call is counted so tests can assert on network traffic.
#[derive(Default)]
pub struct MockGithub {
    user: Option<User>,
    user_error: Option<FetchError>,
    transient_user_failures: AtomicUsize,
    repos: Vec<Repository>,
    languages: HashMap<String, BTreeMap<String, u64>>,
    language_failures: Vec<String>,
    readme: Option<String>,
    signals: Option<ContributionSignalsData>,
    organizations: Vec<Organization>,
    gists: Vec<Gist>,
    social_accounts: Vec<SocialAccount>,
    contributors: HashMap<String, Vec<Contributor>>,
    releases: HashMap<String, Vec<Release>>,
    workflows: HashMap<String, Vec<Workflow>>,
    /// `owner/name:path` entries that exist.
    files: Vec<String>,
    failing_extended: bool,
    token: bool,
    pub extended_calls: AtomicUsize,
    pub user_calls: AtomicUsize,
    pub repo_calls: AtomicUsize,
    pub language_calls: AtomicUsize,
    pub signal_calls: AtomicUsize,
}

impl MockGithub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    /// Every user lookup fails with `error`.
    pub fn failing_user(mut self, error: FetchError) -> Self {
        self.user_error = Some(error);
        self
    }

    /// The first `n` user lookups fail with a network error, then succeed.
    pub fn flaky_user(self, n: usize) -> Self {
        self.transient_user_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_repos(mut self, repos: Vec<Repository>) -> Self {
        self.repos = repos;
        self
    }

    pub fn with_languages(mut self, full_name: &str, languages: &[(&str, u64)]) -> Self {
        let map = languages
            .iter()
            .map(|(l, b)| (l.to_string(), *b))
            .collect();
        self.languages.insert(full_name.to_string(), map);
        self
    }

    pub fn failing_languages(mut self, full_name: &str) -> Self {
        self.language_failures.push(full_name.to_string());
        self
    }

    pub fn with_readme(mut self, readme: &str) -> Self {
        self.readme = Some(readme.to_string());
        self
    }

    /// Contribution signals from a raw GraphQL `data` JSON body.
    pub fn with_signals_json(mut self, json: &str) -> Self {
        self.signals = serde_json::from_str(json).ok();
        self
    }

    pub fn with_token(mut self) -> Self {
        self.token = true;
        self
    }

    pub fn with_organizations(mut self, organizations: Vec<Organization>) -> Self {
        self.organizations = organizations;
        self
    }

    pub fn with_gists(mut self, gists: Vec<Gist>) -> Self {
        self.gists = gists;
        self
    }

    pub fn with_social_accounts(mut self, accounts: Vec<SocialAccount>) -> Self {
        self.social_accounts = accounts;
        self
    }

    pub fn with_contributors(mut self, full_name: &str, contributors: Vec<Contributor>) -> Self {
        self.contributors.insert(full_name.to_string(), contributors);
        self
    }

    pub fn with_releases(mut self, full_name: &str, releases: Vec<Release>) -> Self {
        self.releases.insert(full_name.to_string(), releases);
        self
    }

    pub fn with_workflows(mut self, full_name: &str, workflows: Vec<Workflow>) -> Self {
        self.workflows.insert(full_name.to_string(), workflows);
        self
    }

    pub fn with_file(mut self, full_name: &str, path: &str) -> Self {
        self.files.push(format!("{full_name}:{path}"));
        self
    }

    /// Every extended-data call fails with a network error.
    pub fn failing_extended(mut self) -> Self {
        self.failing_extended = true;
        self
    }

    pub fn extended_call_count(&self) -> usize {
        self.extended_calls.load(Ordering::SeqCst)
    }

    fn extended<T>(&self, what: &str, value: T) -> Result<T, FetchError> {
        self.extended_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_extended {
            return Err(FetchError::Network(format!("MockGithub: {what} unavailable")));
        }
        Ok(value)
    }

    pub fn user_call_count(&self) -> usize {
        self.user_calls.load(Ordering::SeqCst)
    }

    pub fn signal_call_count(&self) -> usize {
        self.signal_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GithubApi for MockGithub {
    fn has_token(&self) -> bool {
        self.token
    }

    async fn user(&self, login: &str) -> Result<User, FetchError> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.user_error {
            return Err(e.clone());
        }
        let remaining = self.transient_user_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_user_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(FetchError::Network("MockGithub: connection reset".to_string()));
        }
        match &self.user {
            Some(u) if u.login.eq_ignore_ascii_case(login) => Ok(u.clone()),
            _ => Err(FetchError::NotFound(format!("MockGithub: no user {login}"))),
        }
    }

    async fn repositories(&self, _login: &str, limit: usize) -> Result<Vec<Repository>, FetchError> {
        self.repo_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.repos.iter().take(limit).cloned().collect())
    }

    async fn languages(&self, full_name: &str) -> Result<BTreeMap<String, u64>, FetchError> {
        self.language_calls.fetch_add(1, Ordering::SeqCst);
        if self.language_failures.iter().any(|f| f == full_name) {
            return Err(FetchError::Network(format!(
                "MockGithub: languages unavailable for {full_name}"
            )));
        }
        Ok(self.languages.get(full_name).cloned().unwrap_or_default())
    }

    async fn readme(&self, _full_name: &str) -> Result<Option<String>, FetchError> {
        Ok(self.readme.clone())
    }

    async fn contribution_signals(
        &self,
        login: &str,
    ) -> Result<ContributionSignalsData, FetchError> {
        self.signal_calls.fetch_add(1, Ordering::SeqCst);
        self.signals
            .clone()
            .ok_or_else(|| FetchError::Parse(format!("MockGithub: no signals for {login}")))
    }

    async fn organizations(&self, _login: &str, limit: usize) -> Result<Vec<Organization>, FetchError> {
        let organizations = self.organizations.iter().take(limit).cloned().collect();
        self.extended("organizations", organizations)
    }

    async fn gists(&self, _login: &str, limit: usize) -> Result<Vec<Gist>, FetchError> {
        self.extended("gists", self.gists.iter().take(limit).cloned().collect())
    }

    async fn social_accounts(&self, _login: &str) -> Result<Vec<SocialAccount>, FetchError> {
        self.extended("social accounts", self.social_accounts.clone())
    }

    async fn contributors(
        &self,
        full_name: &str,
        limit: usize,
    ) -> Result<Vec<Contributor>, FetchError> {
        let contributors = self.contributors.get(full_name).cloned().unwrap_or_default();
        self.extended("contributors", contributors.into_iter().take(limit).collect())
    }

    async fn releases(&self, full_name: &str, limit: usize) -> Result<Vec<Release>, FetchError> {
        let releases = self.releases.get(full_name).cloned().unwrap_or_default();
        self.extended("releases", releases.into_iter().take(limit).collect())
    }

    async fn workflows(&self, full_name: &str) -> Result<Vec<Workflow>, FetchError> {
        let workflows = self.workflows.get(full_name).cloned().unwrap_or_default();
        self.extended("workflows", workflows)
    }

    async fn has_file(&self, full_name: &str, path: &str) -> Result<bool, FetchError> {
        let key = format!("{full_name}:{path}");
        self.extended("contents", self.files.contains(&key))
    }
}

// ---------------------------------------------------------------------------
// MockPageFetcher
// ---------------------------------------------------------------------------

/// HashMap-based page fetcher. Returns `NotFound` for unregistered URLs.
#[derive(Default)]
pub struct MockPageFetcher {
    pages: HashMap<String, String>,
    failures: HashMap<String, FetchError>,
    slow: HashMap<String, Duration>,
    /// Remaining rate-limit answers per URL.
    throttled: Mutex<HashMap<String, usize>>,
    gauge: Option<Arc<InFlightGauge>>,
    calls: Mutex<Vec<String>>,
}

impl MockPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(mut self, url: &str, markdown: &str) -> Self {
        self.pages.insert(url.to_string(), markdown.to_string());
        self
    }

    pub fn on_failure(mut self, url: &str, error: FetchError) -> Self {
        self.failures.insert(url.to_string(), error);
        self
    }

    /// Sleep before answering; pair with a short crawl timeout.
    pub fn slow(mut self, url: &str, delay: Duration) -> Self {
        self.slow.insert(url.to_string(), delay);
        self
    }

    /// Answer the first `n` requests for `url` with `RateLimited`.
    pub fn throttled(self, url: &str, n: usize) -> Self {
        if let Ok(mut throttled) = self.throttled.lock() {
            throttled.insert(url.to_string(), n);
        }
        self
    }

    pub fn with_gauge(mut self, gauge: Arc<InFlightGauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn markdown(&self, url: &str) -> Result<String, FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        let _running = self.gauge.as_deref().map(InFlightGauge::enter);
        if let Some(delay) = self.slow.get(url) {
            tokio::time::sleep(*delay).await;
        }
        if take_throttle(&self.throttled, url) {
            return Err(FetchError::RateLimited(format!("MockPageFetcher: 429 for {url}")));
        }
        if let Some(e) = self.failures.get(url) {
            return Err(e.clone());
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(format!("MockPageFetcher: no page for {url}")))
    }
}

// ---------------------------------------------------------------------------
// MockProfessionalNetwork
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockProfessionalNetwork {
    profiles: HashMap<String, ProfessionalProfile>,
    throttled: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
    gauge: Option<Arc<InFlightGauge>>,
    pub calls: AtomicUsize,
}

impl MockProfessionalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_profile(mut self, url: &str, profile: ProfessionalProfile) -> Self {
        self.profiles.insert(url.to_string(), profile);
        self
    }

    /// Answer the first `n` requests for `url` with `RateLimited`.
    pub fn throttled(self, url: &str, n: usize) -> Self {
        if let Ok(mut throttled) = self.throttled.lock() {
            throttled.insert(url.to_string(), n);
        }
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_gauge(mut self, gauge: Arc<InFlightGauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfessionalNetworkApi for MockProfessionalNetwork {
    async fn profile(&self, url: &str) -> Result<ProfessionalProfile, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _running = self.gauge.as_deref().map(InFlightGauge::enter);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if take_throttle(&self.throttled, url) {
            return Err(FetchError::RateLimited(format!(
                "MockProfessionalNetwork: 429 for {url}"
            )));
        }
        self.profiles.get(url).cloned().ok_or_else(|| {
            FetchError::NotFound(format!("MockProfessionalNetwork: no profile for {url}"))
        })
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Consume one pending rate-limit answer for `url`, if any.
fn take_throttle(throttled: &Mutex<HashMap<String, usize>>, url: &str) -> bool {
    let Ok(mut throttled) = throttled.lock() else {
        return false;
    };
    match throttled.get_mut(url) {
        Some(remaining) if *remaining > 0 => {
            *remaining -= 1;
            true
        }
        _ => false,
    }
}

/// Counts mocked calls running at the same time, across mocks that share it.
#[derive(Debug, Default)]
pub struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self)
    }

    /// Highest number of calls seen running together.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct InFlightGuard<'a>(&'a InFlightGauge);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}
