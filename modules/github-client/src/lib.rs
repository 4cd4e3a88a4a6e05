pub mod error;
pub mod types;

pub use error::{GithubError, Result};
pub use types::{
    ContributionSignalsData, Contributor, Gist, GistFile, GraphQlResponse, License, Organization,
    Release, ReleaseAsset, Repository, SignalsUser, SocialAccount, User, Workflow, WorkflowList,
    CONTRIBUTION_SIGNALS_QUERY,
};

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, ACCEPT, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use types::GraphQlRequest;

const BASE_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const PER_PAGE: usize = 100;
/// Hard stop on pagination; 1000 repositories is far past any profile we summarize.
const MAX_PAGES: usize = 10;

pub struct GithubClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GithubError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Point the client at a different API root (GitHub Enterprise, local fakes).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .client
            .get(url)
            .header(USER_AGENT, "devsignal")
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Fetch a public user profile.
    pub async fn user(&self, login: &str) -> Result<User> {
        let resp = self.get(&format!("/users/{login}")).send().await?;
        let resp = check_status(resp, login).await?;
        Ok(resp.json().await?)
    }

    /// List the user's own repositories, most recently updated first.
    /// Forks are included; callers filter. Stops once `limit` repositories are collected.
    pub async fn repositories(&self, login: &str, limit: usize) -> Result<Vec<Repository>> {
        let mut repos = Vec::new();

        for page in 1..=MAX_PAGES {
            let path = format!(
                "/users/{login}/repos?type=owner&sort=updated&direction=desc&per_page={PER_PAGE}&page={page}"
            );
            let resp = self.get(&path).send().await?;
            let resp = check_status(resp, login).await?;
            let batch: Vec<Repository> = resp.json().await?;
            let exhausted = batch.len() < PER_PAGE;

            tracing::debug!(login, page, count = batch.len(), "Fetched repository page");
            repos.extend(batch);

            if exhausted || repos.len() >= limit {
                break;
            }
        }

        repos.truncate(limit);
        Ok(repos)
    }

    /// Byte counts per language for one repository.
    pub async fn languages(&self, full_name: &str) -> Result<BTreeMap<String, u64>> {
        let resp = self
            .get(&format!("/repos/{full_name}/languages"))
            .send()
            .await?;
        let resp = check_status(resp, full_name).await?;
        Ok(resp.json().await?)
    }

    /// Raw README markdown for a repository. `Ok(None)` when the repository has none.
    pub async fn readme(&self, full_name: &str) -> Result<Option<String>> {
        let resp = self
            .get(&format!("/repos/{full_name}/readme"))
            .header(ACCEPT, "application/vnd.github.raw+json")
            .send()
            .await?;

        match check_status(resp, full_name).await {
            Ok(resp) => Ok(Some(resp.text().await?)),
            Err(GithubError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// One page of a list endpoint, at most `limit` (capped at 100) entries.
    /// 204 No Content, which empty repositories answer for contributors, is an empty list.
    async fn list<T: DeserializeOwned>(&self, path: &str, target: &str, limit: usize) -> Result<Vec<T>> {
        let per_page = limit.clamp(1, PER_PAGE);
        let separator = if path.contains('?') { '&' } else { '?' };
        let resp = self
            .get(&format!("{path}{separator}per_page={per_page}"))
            .send()
            .await?;
        let resp = check_status(resp, target).await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        let mut items: Vec<T> = resp.json().await?;
        items.truncate(limit);
        Ok(items)
    }

    pub async fn organizations(&self, login: &str, limit: usize) -> Result<Vec<Organization>> {
        self.list(&format!("/users/{login}/orgs"), login, limit).await
    }

    pub async fn gists(&self, login: &str, limit: usize) -> Result<Vec<Gist>> {
        self.list(&format!("/users/{login}/gists"), login, limit).await
    }

    pub async fn social_accounts(&self, login: &str) -> Result<Vec<SocialAccount>> {
        self.list(&format!("/users/{login}/social_accounts"), login, PER_PAGE)
            .await
    }

    /// Top contributors by commit count.
    pub async fn contributors(&self, full_name: &str, limit: usize) -> Result<Vec<Contributor>> {
        self.list(&format!("/repos/{full_name}/contributors"), full_name, limit)
            .await
    }

    /// Most recent releases first.
    pub async fn releases(&self, full_name: &str, limit: usize) -> Result<Vec<Release>> {
        self.list(&format!("/repos/{full_name}/releases"), full_name, limit)
            .await
    }

    pub async fn workflows(&self, full_name: &str) -> Result<Vec<Workflow>> {
        let resp = self
            .get(&format!("/repos/{full_name}/actions/workflows"))
            .send()
            .await?;
        let resp = check_status(resp, full_name).await?;
        let list: WorkflowList = resp.json().await?;
        Ok(list.workflows)
    }

    /// Whether `path` exists in the repository's default branch.
    pub async fn has_file(&self, full_name: &str, path: &str) -> Result<bool> {
        let resp = self
            .get(&format!("/repos/{full_name}/contents/{path}"))
            .send()
            .await?;
        match check_status(resp, full_name).await {
            Ok(_) => Ok(true),
            Err(GithubError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Run a GraphQL query. The GraphQL endpoint always requires a token.
    /// A response carrying an `errors` array is an error even if `data` is partially present.
    pub async fn graphql<T, V>(&self, query: &str, variables: V) -> Result<T>
    where
        T: DeserializeOwned,
        V: serde::Serialize,
    {
        let Some(ref token) = self.token else {
            return Err(GithubError::Unauthorized(
                "GraphQL API requires a token".to_string(),
            ));
        };

        let body = GraphQlRequest { query, variables };
        let resp = self
            .client
            .post(format!("{}/graphql", self.base_url))
            .header(USER_AGENT, "devsignal")
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp, "graphql").await?;

        let envelope: GraphQlResponse<T> = resp.json().await?;
        if let Some(errors) = envelope.errors.filter(|e| !e.is_empty()) {
            let joined = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GithubError::GraphQl(joined));
        }

        envelope
            .data
            .ok_or_else(|| GithubError::Parse("GraphQL response had no data".to_string()))
    }
}

/// Map non-success statuses onto the error taxonomy. 403 is a rate limit only
/// when the quota header says so; otherwise it is an auth problem.
async fn check_status(resp: Response, target: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if is_rate_limited(status, resp.headers()) {
        let reset_at = header_i64(resp.headers(), "x-ratelimit-reset");
        tracing::warn!(target, ?reset_at, "GitHub rate limit hit");
        return Err(GithubError::RateLimited { reset_at });
    }

    let message = resp.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GithubError::Unauthorized(message)),
        StatusCode::NOT_FOUND => Err(GithubError::NotFound(target.to_string())),
        _ => Err(GithubError::Api {
            status: status.as_u16(),
            message,
        }),
    }
}

fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && header_i64(headers, "x-ratelimit-remaining") == Some(0))
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}
