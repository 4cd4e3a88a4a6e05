use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- REST: users ---

/// A public user profile from `GET /users/{login}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    pub login: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub blog: Option<String>,
    pub twitter_username: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub public_repos: u32,
    #[serde(default)]
    pub followers: u32,
    #[serde(default)]
    pub following: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub hireable: Option<bool>,
}

// --- REST: repositories ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct License {
    pub name: Option<String>,
    pub spdx_id: Option<String>,
}

/// A repository from `GET /users/{login}/repos`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u32,
    #[serde(default)]
    pub forks_count: u32,
    #[serde(default)]
    pub watchers_count: u32,
    /// Size in kilobytes as reported by the API.
    #[serde(default)]
    pub size: u64,
    pub html_url: String,
    pub homepage: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub has_wiki: bool,
    #[serde(default)]
    pub has_pages: bool,
    #[serde(default)]
    pub open_issues_count: u32,
    pub license: Option<License>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub default_branch: Option<String>,
}

// --- REST: extended user data ---

/// An organization membership from `GET /users/{login}/orgs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Organization {
    pub login: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GistFile {
    pub language: Option<String>,
}

/// A public gist from `GET /users/{login}/gists`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Gist {
    pub id: String,
    pub description: Option<String>,
    #[serde(default)]
    pub public: bool,
    pub html_url: String,
    #[serde(default)]
    pub files: BTreeMap<String, GistFile>,
    #[serde(default)]
    pub comments: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A linked account from `GET /users/{login}/social_accounts`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SocialAccount {
    pub provider: String,
    pub url: String,
}

// --- REST: extended repository data ---

/// Anonymous contributors carry no login.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Contributor {
    pub login: Option<String>,
    #[serde(default)]
    pub contributions: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseAsset {
    #[serde(default)]
    pub download_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub name: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub draft: bool,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    pub fn download_count(&self) -> u64 {
        self.assets.iter().map(|a| a.download_count).sum()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Workflow {
    pub name: String,
    pub state: String,
    pub path: String,
}

/// Envelope of `GET /repos/{full_name}/actions/workflows`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowList {
    #[serde(default)]
    pub workflows: Vec<Workflow>,
}

// --- GraphQL ---

/// Request body for `POST /graphql`.
#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest<'a, V: Serialize> {
    pub query: &'a str,
    pub variables: V,
}

/// Envelope for every GraphQL response. Both halves may be present at once.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

/// Contribution activity beyond repositories: reviews, issues, discussions, projects.
pub const CONTRIBUTION_SIGNALS_QUERY: &str = r#"
query($username: String!) {
  user(login: $username) {
    login
    hasSponsorsListing
    pullRequests(first: 100, states: [MERGED, CLOSED]) {
      totalCount
      nodes {
        reviews(first: 50) {
          totalCount
          nodes { state author { login } }
        }
      }
    }
    issues(first: 100, states: [OPEN, CLOSED]) {
      totalCount
      nodes {
        state
        author { login }
        comments(first: 50) {
          totalCount
          nodes { author { login } }
        }
      }
    }
    repositoryDiscussions(first: 100) {
      totalCount
      nodes {
        author { login }
        comments(first: 50) {
          totalCount
          nodes { author { login } }
        }
      }
    }
    projectsV2(first: 100) {
      totalCount
      nodes {
        items(first: 50) {
          totalCount
          nodes { creator { login } }
        }
      }
    }
  }
}
"#;

// Every level is optional: GitHub nulls out fields the token cannot see
// and drops whole nodes for deleted authors.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContributionSignalsData {
    pub user: Option<SignalsUser>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalsUser {
    pub login: Option<String>,
    pub has_sponsors_listing: Option<bool>,
    pub pull_requests: Option<Connection<PullRequestNode>>,
    pub issues: Option<Connection<IssueNode>>,
    pub repository_discussions: Option<Connection<DiscussionNode>>,
    #[serde(rename = "projectsV2")]
    pub projects_v2: Option<Connection<ProjectNode>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    pub total_count: Option<u32>,
    pub nodes: Option<Vec<Option<T>>>,
}

impl<T> Connection<T> {
    /// Iterate over the non-null nodes.
    pub fn present(&self) -> impl Iterator<Item = &T> {
        self.nodes.iter().flatten().flatten()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Actor {
    pub login: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestNode {
    pub reviews: Option<Connection<ReviewNode>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewNode {
    pub state: Option<String>,
    pub author: Option<Actor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueNode {
    pub state: Option<String>,
    pub author: Option<Actor>,
    pub comments: Option<Connection<CommentNode>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscussionNode {
    pub author: Option<Actor>,
    pub comments: Option<Connection<CommentNode>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentNode {
    pub author: Option<Actor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectNode {
    pub items: Option<Connection<ProjectItemNode>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectItemNode {
    pub creator: Option<Actor>,
}

impl Actor {
    pub fn is(&self, login: &str) -> bool {
        self.login
            .as_deref()
            .is_some_and(|l| l.eq_ignore_ascii_case(login))
    }
}
