// Network seams. Connectors talk to these traits; the client crates and the
// test mocks implement them.

mod github;
mod page;
mod professional;

pub use page::{BrowserlessPageFetcher, DirectPageFetcher};

use std::collections::BTreeMap;

use async_trait::async_trait;
use devsignal_common::{FetchError, ProfessionalProfile};
use github_client::{
    ContributionSignalsData, Contributor, Gist, Organization, Release, Repository, SocialAccount,
    User, Workflow,
};

/// The primary platform's REST and GraphQL surface.
#[async_trait]
pub trait GithubApi: Send + Sync {
    fn has_token(&self) -> bool;
    async fn user(&self, login: &str) -> Result<User, FetchError>;
    /// Owned repositories, most recently updated first, forks included.
    async fn repositories(&self, login: &str, limit: usize) -> Result<Vec<Repository>, FetchError>;
    async fn languages(&self, full_name: &str) -> Result<BTreeMap<String, u64>, FetchError>;
    async fn readme(&self, full_name: &str) -> Result<Option<String>, FetchError>;
    async fn contribution_signals(&self, login: &str)
        -> Result<ContributionSignalsData, FetchError>;

    async fn organizations(&self, login: &str, limit: usize) -> Result<Vec<Organization>, FetchError>;
    async fn gists(&self, login: &str, limit: usize) -> Result<Vec<Gist>, FetchError>;
    async fn social_accounts(&self, login: &str) -> Result<Vec<SocialAccount>, FetchError>;
    async fn contributors(&self, full_name: &str, limit: usize)
        -> Result<Vec<Contributor>, FetchError>;
    async fn releases(&self, full_name: &str, limit: usize) -> Result<Vec<Release>, FetchError>;
    async fn workflows(&self, full_name: &str) -> Result<Vec<Workflow>, FetchError>;
    async fn has_file(&self, full_name: &str, path: &str) -> Result<bool, FetchError>;
}

/// Renders a page and returns its main content as markdown.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn markdown(&self, url: &str) -> Result<String, FetchError>;
}

/// Looks up one professional-network profile by canonical URL.
#[async_trait]
pub trait ProfessionalNetworkApi: Send + Sync {
    async fn profile(&self, url: &str) -> Result<ProfessionalProfile, FetchError>;
}
