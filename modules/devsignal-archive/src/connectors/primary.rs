use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::future::Future;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use devsignal_common::{
    ContributorRecord, FetchError, GistRecord, Identity, OrganizationRecord, PrimaryProfile,
    RawResult, ReleaseRecord, RepositoryRecord, SocialLink, SourcePayload, SourceTag,
    WorkflowRecord,
};
use futures::stream::{self, StreamExt};
use github_client::{Gist, Repository, SocialAccount, User};
use regex::Regex;
use tracing::{debug, info, warn};

use super::SourceConnector;
use crate::cache::{CacheKey, CacheStore};
use crate::fetchers::GithubApi;
use crate::retry::RetryPolicy;

/// Parallel per-repository language calls.
const LANGUAGE_CONCURRENCY: usize = 4;
const MAX_TOPICS: usize = 5;
const MAX_ORGANIZATIONS: usize = 10;
const MAX_GISTS: usize = 20;
const MAX_CONTRIBUTORS: usize = 10;
const MAX_RELEASES: usize = 5;
const SECURITY_POLICY_PATHS: &[&str] = &["SECURITY.md", ".github/SECURITY.md"];

/// Profile links recognised as accounts on a known platform.
static SOCIAL_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("LinkedIn", r"(?i)linkedin\.com/in/([^/?#]+)"),
        ("Twitter", r"(?i)(?:^|[/.])(?:twitter|x)\.com/@?([^/?#]+)"),
        ("Medium", r"(?i)medium\.com/@?([^/?#]+)"),
        ("Dev.to", r"(?i)dev\.to/([^/?#]+)"),
    ]
    .into_iter()
    .map(|(platform, pattern)| (platform, Regex::new(pattern).expect("valid regex")))
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryParams {
    pub max_repos: usize,
    pub fetch_readme: bool,
    /// Organizations, gists and social accounts; with a token, also per-repository
    /// contributors, releases, workflows and security policy.
    pub extended: bool,
}

impl Default for PrimaryParams {
    fn default() -> Self {
        Self {
            max_repos: 20,
            fetch_readme: true,
            extended: true,
        }
    }
}

/// Profile and repositories from the primary platform. The one mandatory source.
pub struct PrimaryConnector {
    api: Arc<dyn GithubApi>,
    cache: Arc<CacheStore>,
    retry: RetryPolicy,
}

impl PrimaryConnector {
    pub fn new(api: Arc<dyn GithubApi>, cache: Arc<CacheStore>) -> Self {
        Self {
            api,
            cache,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_fresh(
        &self,
        login: &str,
        params: &PrimaryParams,
    ) -> Result<PrimaryProfile, FetchError> {
        let api = self.api.as_ref();

        let user = self.retry.run("user", || api.user(login)).await?;

        // Forks are filtered here, so ask for more than we keep.
        let listing_limit = (params.max_repos * 3).max(100);
        let listed = self
            .retry
            .run("repositories", || api.repositories(&user.login, listing_limit))
            .await?;
        let owned: Vec<Repository> = listed
            .into_iter()
            .filter(|r| !r.fork)
            .take(params.max_repos)
            .collect();

        // Per-repository details cost four calls each; anonymous quota cannot carry them.
        let detailed = params.extended && api.has_token();
        let repositories: Vec<RepositoryRecord> = stream::iter(owned)
            .map(|repo| async move {
                let languages = self.repo_languages(&repo).await;
                let mut record = to_record(repo, languages);
                if detailed {
                    self.repo_details(&mut record).await;
                }
                record
            })
            .buffered(LANGUAGE_CONCURRENCY)
            .collect()
            .await;

        let profile_readme = if params.fetch_readme {
            self.profile_readme(&user.login).await
        } else {
            None
        };

        let (organizations, gists, api_accounts) = if params.extended {
            let login = user.login.as_str();
            futures::join!(
                best_effort("organizations", login, api.organizations(login, MAX_ORGANIZATIONS)),
                best_effort("gists", login, api.gists(login, MAX_GISTS)),
                best_effort("social accounts", login, api.social_accounts(login)),
            )
        } else {
            (None, None, None)
        };
        let organizations = organizations
            .unwrap_or_default()
            .into_iter()
            .map(|o| OrganizationRecord {
                login: o.login,
                description: o.description.filter(|d| !d.trim().is_empty()),
            })
            .collect();
        let gists: Vec<GistRecord> = gists.unwrap_or_default().into_iter().map(to_gist).collect();
        let social_accounts = if params.extended {
            social_links(&user, api_accounts.unwrap_or_default())
        } else {
            Vec::new()
        };

        info!(
            login = %user.login,
            repos = repositories.len(),
            readme = profile_readme.is_some(),
            gists = gists.len(),
            detailed,
            "Primary profile fetched"
        );

        Ok(PrimaryProfile {
            login: user.login,
            name: user.name,
            bio: user.bio,
            location: user.location,
            company: user.company,
            blog: user.blog.filter(|b| !b.trim().is_empty()),
            twitter_username: user.twitter_username,
            email: user.email,
            hireable: user.hireable,
            public_repos: user.public_repos,
            followers: user.followers,
            following: user.following,
            created_at: user.created_at,
            repositories,
            profile_readme,
            organizations,
            gists,
            social_accounts,
        })
    }

    /// Contributors, releases, workflows and security policy, each best-effort.
    async fn repo_details(&self, record: &mut RepositoryRecord) {
        let api = self.api.as_ref();
        let full_name = record.full_name.as_str();
        let (contributors, releases, workflows, has_security_policy) = futures::join!(
            best_effort("contributors", full_name, api.contributors(full_name, MAX_CONTRIBUTORS)),
            best_effort("releases", full_name, api.releases(full_name, MAX_RELEASES)),
            best_effort("workflows", full_name, api.workflows(full_name)),
            self.has_security_policy(full_name),
        );

        record.contributors = contributors
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| {
                Some(ContributorRecord {
                    login: c.login?,
                    contributions: c.contributions,
                })
            })
            .collect();
        record.releases = releases
            .unwrap_or_default()
            .into_iter()
            .map(|r| ReleaseRecord {
                download_count: r.download_count(),
                name: r.name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| r.tag_name.clone()),
                tag_name: r.tag_name,
                published_at: r.published_at,
                prerelease: r.prerelease,
                draft: r.draft,
            })
            .collect();
        record.workflows = workflows
            .unwrap_or_default()
            .into_iter()
            .map(|w| WorkflowRecord {
                name: w.name,
                state: w.state,
                path: w.path,
            })
            .collect();
        record.has_security_policy = has_security_policy;
    }

    async fn has_security_policy(&self, full_name: &str) -> bool {
        for path in SECURITY_POLICY_PATHS {
            if best_effort("security policy", full_name, self.api.has_file(full_name, path))
                .await
                .unwrap_or(false)
            {
                return true;
            }
        }
        false
    }

    /// Byte breakdown, or the primary language weighted by repository size
    /// when the breakdown is unavailable.
    async fn repo_languages(&self, repo: &Repository) -> BTreeMap<String, u64> {
        match self.api.languages(&repo.full_name).await {
            Ok(languages) if !languages.is_empty() => return languages,
            Ok(_) => {}
            Err(e) => {
                warn!(repo = %repo.full_name, error = %e, "Language breakdown failed, using primary language");
            }
        }

        let mut fallback = BTreeMap::new();
        if let Some(language) = repo.language.clone() {
            fallback.insert(language, repo.size.max(1) * 1024);
        }
        fallback
    }

    /// The `<login>/<login>` profile README, best-effort.
    async fn profile_readme(&self, login: &str) -> Option<String> {
        let full_name = format!("{login}/{login}");
        match self.api.readme(&full_name).await {
            Ok(readme) => readme.filter(|r| !r.trim().is_empty()),
            Err(e) => {
                debug!(repo = %full_name, error = %e, "Profile README unavailable");
                None
            }
        }
    }
}

/// Optional detail calls never fail the fetch.
async fn best_effort<T>(
    what: &str,
    target: &str,
    call: impl Future<Output = Result<T, FetchError>>,
) -> Option<T> {
    match call.await {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(target, what, error = %e, "Optional detail unavailable");
            None
        }
    }
}

fn to_gist(gist: Gist) -> GistRecord {
    let languages: BTreeSet<String> = gist
        .files
        .values()
        .filter_map(|f| f.language.clone())
        .collect();
    GistRecord {
        id: gist.id,
        description: gist.description.filter(|d| !d.trim().is_empty()),
        html_url: gist.html_url,
        files_count: gist.files.len() as u32,
        languages: languages.into_iter().collect(),
        comments: gist.comments,
        created_at: gist.created_at,
        updated_at: gist.updated_at,
    }
}

/// Linked accounts, then the declared Twitter handle, then a blog that points
/// at a known platform. Duplicate URLs keep their first entry.
fn social_links(user: &User, linked: Vec<SocialAccount>) -> Vec<SocialLink> {
    let mut links: Vec<SocialLink> = linked
        .into_iter()
        .map(|account| match recognise(&account.url) {
            Some((platform, username)) => SocialLink {
                platform: platform.to_string(),
                username: Some(username),
                url: account.url,
            },
            None => SocialLink {
                platform: provider_name(&account.provider),
                username: None,
                url: account.url,
            },
        })
        .collect();

    if let Some(handle) = user.twitter_username.as_deref().filter(|h| !h.trim().is_empty()) {
        links.push(SocialLink {
            platform: "Twitter".to_string(),
            username: Some(handle.to_string()),
            url: format!("https://twitter.com/{handle}"),
        });
    }
    if let Some(blog) = user.blog.as_deref().map(str::trim) {
        if let Some((platform, username)) = recognise(blog) {
            links.push(SocialLink {
                platform: platform.to_string(),
                username: Some(username),
                url: blog.to_string(),
            });
        }
    }

    let mut seen = HashSet::new();
    links.retain(|l| seen.insert(l.url.trim_end_matches('/').to_ascii_lowercase()));
    links
}

fn recognise(url: &str) -> Option<(&'static str, String)> {
    SOCIAL_PATTERNS.iter().find_map(|(platform, re)| {
        let caps = re.captures(url)?;
        Some((*platform, caps[1].to_string()))
    })
}

/// `generic` is the API's name for a plain website link.
fn provider_name(provider: &str) -> String {
    match provider {
        "generic" | "" => "Website".to_string(),
        other => {
            let mut chars = other.chars();
            chars
                .next()
                .map(|first| first.to_uppercase().chain(chars).collect())
                .unwrap_or_default()
        }
    }
}

fn to_record(repo: Repository, languages: BTreeMap<String, u64>) -> RepositoryRecord {
    let license = repo.license.and_then(|l| {
        l.spdx_id
            .filter(|id| !id.is_empty() && id != "NOASSERTION")
            .or(l.name)
    });
    let mut topics = repo.topics;
    topics.truncate(MAX_TOPICS);

    RepositoryRecord {
        name: repo.name,
        full_name: repo.full_name,
        html_url: repo.html_url,
        description: repo.description.filter(|d| !d.trim().is_empty()),
        homepage: repo.homepage.filter(|h| !h.trim().is_empty()),
        primary_language: repo.language,
        languages,
        stars: repo.stargazers_count,
        forks: repo.forks_count,
        watchers: repo.watchers_count,
        open_issues: repo.open_issues_count,
        size_kb: repo.size,
        topics,
        license,
        has_wiki: repo.has_wiki,
        has_pages: repo.has_pages,
        archived: repo.archived,
        created_at: repo.created_at,
        updated_at: repo.updated_at,
        ..Default::default()
    }
}

#[async_trait]
impl SourceConnector for PrimaryConnector {
    type Params = PrimaryParams;

    fn source(&self) -> SourceTag {
        SourceTag::Primary
    }

    async fn fetch(
        &self,
        identity: &Identity,
        params: &PrimaryParams,
    ) -> Result<RawResult, FetchError> {
        let key = CacheKey::new(identity, SourceTag::Primary)
            .with_param("max_repos", params.max_repos)
            .with_param("readme", params.fetch_readme)
            .with_param("extended", params.extended);

        self.cache
            .get_or_fetch(&key, || async move {
                let profile = self.fetch_fresh(identity.as_str(), params).await?;
                Ok::<_, FetchError>(SourcePayload::Primary(profile))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_platforms_are_recognised_from_urls() {
        assert_eq!(
            recognise("https://x.com/ada_l"),
            Some(("Twitter", "ada_l".to_string()))
        );
        assert_eq!(
            recognise("https://medium.com/@ada"),
            Some(("Medium", "ada".to_string()))
        );
        assert_eq!(recognise("https://dropbox.com/s/abc"), None);
        assert_eq!(recognise("https://ada.dev"), None);
    }

    #[test]
    fn provider_names_are_capitalised() {
        assert_eq!(provider_name("mastodon"), "Mastodon");
        assert_eq!(provider_name("generic"), "Website");
    }
}
