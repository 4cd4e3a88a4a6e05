use std::collections::BTreeMap;

use async_trait::async_trait;
use devsignal_common::FetchError;
use github_client::{
    ContributionSignalsData, Contributor, Gist, GithubClient, Organization, Release, Repository,
    SocialAccount, User, Workflow,
};
use serde_json::json;

use super::GithubApi;
use crate::error::from_github;

#[async_trait]
impl GithubApi for GithubClient {
    fn has_token(&self) -> bool {
        GithubClient::has_token(self)
    }

    async fn user(&self, login: &str) -> Result<User, FetchError> {
        GithubClient::user(self, login).await.map_err(from_github)
    }

    async fn repositories(&self, login: &str, limit: usize) -> Result<Vec<Repository>, FetchError> {
        GithubClient::repositories(self, login, limit)
            .await
            .map_err(from_github)
    }

    async fn languages(&self, full_name: &str) -> Result<BTreeMap<String, u64>, FetchError> {
        GithubClient::languages(self, full_name)
            .await
            .map_err(from_github)
    }

    async fn readme(&self, full_name: &str) -> Result<Option<String>, FetchError> {
        GithubClient::readme(self, full_name)
            .await
            .map_err(from_github)
    }

    async fn contribution_signals(
        &self,
        login: &str,
    ) -> Result<ContributionSignalsData, FetchError> {
        self.graphql(
            github_client::CONTRIBUTION_SIGNALS_QUERY,
            json!({ "username": login }),
        )
        .await
        .map_err(from_github)
    }

    async fn organizations(&self, login: &str, limit: usize) -> Result<Vec<Organization>, FetchError> {
        GithubClient::organizations(self, login, limit)
            .await
            .map_err(from_github)
    }

    async fn gists(&self, login: &str, limit: usize) -> Result<Vec<Gist>, FetchError> {
        GithubClient::gists(self, login, limit)
            .await
            .map_err(from_github)
    }

    async fn social_accounts(&self, login: &str) -> Result<Vec<SocialAccount>, FetchError> {
        GithubClient::social_accounts(self, login)
            .await
            .map_err(from_github)
    }

    async fn contributors(
        &self,
        full_name: &str,
        limit: usize,
    ) -> Result<Vec<Contributor>, FetchError> {
        GithubClient::contributors(self, full_name, limit)
            .await
            .map_err(from_github)
    }

    async fn releases(&self, full_name: &str, limit: usize) -> Result<Vec<Release>, FetchError> {
        GithubClient::releases(self, full_name, limit)
            .await
            .map_err(from_github)
    }

    async fn workflows(&self, full_name: &str) -> Result<Vec<Workflow>, FetchError> {
        GithubClient::workflows(self, full_name)
            .await
            .map_err(from_github)
    }

    async fn has_file(&self, full_name: &str, path: &str) -> Result<bool, FetchError> {
        GithubClient::has_file(self, full_name, path)
            .await
            .map_err(from_github)
    }
}
