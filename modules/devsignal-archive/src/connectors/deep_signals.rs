use std::sync::Arc;

use async_trait::async_trait;
use devsignal_common::{
    DeepSignals, DiscussionSignals, FetchError, Identity, IssueSignals, ProjectSignals, RawResult,
    ReviewSignals, SourcePayload, SourceTag,
};
use github_client::SignalsUser;
use tracing::info;

use super::SourceConnector;
use crate::cache::{CacheKey, CacheStore};
use crate::fetchers::GithubApi;
use crate::retry::RetryPolicy;

/// Contribution activity beyond repositories, via the GraphQL API.
pub struct DeepSignalsConnector {
    api: Arc<dyn GithubApi>,
    cache: Arc<CacheStore>,
    retry: RetryPolicy,
}

impl DeepSignalsConnector {
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
}

#[async_trait]
impl SourceConnector for DeepSignalsConnector {
    type Params = ();

    fn source(&self) -> SourceTag {
        SourceTag::DeepSignals
    }

    async fn fetch(&self, identity: &Identity, _params: &()) -> Result<RawResult, FetchError> {
        if !self.api.has_token() {
            return Err(FetchError::Auth("token required".to_string()));
        }

        let key = CacheKey::new(identity, SourceTag::DeepSignals);
        let api = self.api.as_ref();
        let login = identity.as_str();

        self.cache
            .get_or_fetch(&key, || async move {
                let data = self
                    .retry
                    .run("contribution signals", || api.contribution_signals(login))
                    .await?;
                let user = data.user.ok_or_else(|| {
                    FetchError::Parse("contribution signals response had no user".to_string())
                })?;
                let signals = summarize_signals(&user, login);
                info!(
                    login,
                    reviews = signals.pr_reviews.total,
                    issues = signals.issues.opened,
                    "Deep signals fetched"
                );
                Ok::<_, FetchError>(SourcePayload::DeepSignals(signals))
            })
            .await
    }
}

/// Count the subject's own activity. Nodes authored by others and null nodes
/// are skipped; a missing connection counts as zero.
pub fn summarize_signals(user: &SignalsUser, login: &str) -> DeepSignals {
    let mut reviews = ReviewSignals::default();
    for pr in user.pull_requests.iter().flat_map(|c| c.present()) {
        for review in pr.reviews.iter().flat_map(|c| c.present()) {
            if !review.author.as_ref().is_some_and(|a| a.is(login)) {
                continue;
            }
            reviews.total += 1;
            match review.state.as_deref() {
                Some("APPROVED") => reviews.approvals += 1,
                Some("CHANGES_REQUESTED") => reviews.changes_requested += 1,
                _ => {}
            }
        }
    }
    let ratio = f64::from(reviews.approvals) / f64::from(reviews.total.max(1));
    reviews.approval_ratio = (ratio * 100.0).round() / 100.0;

    let mut issues = IssueSignals::default();
    for issue in user.issues.iter().flat_map(|c| c.present()) {
        if issue.author.as_ref().is_some_and(|a| a.is(login)) {
            issues.opened += 1;
            if issue.state.as_deref() == Some("CLOSED") {
                issues.closed += 1;
            }
        }
        issues.comments_authored += issue
            .comments
            .iter()
            .flat_map(|c| c.present())
            .filter(|c| c.author.as_ref().is_some_and(|a| a.is(login)))
            .count() as u32;
    }

    let mut discussions = DiscussionSignals::default();
    for discussion in user.repository_discussions.iter().flat_map(|c| c.present()) {
        if discussion.author.as_ref().is_some_and(|a| a.is(login)) {
            discussions.threads_started += 1;
        }
        discussions.comments_authored += discussion
            .comments
            .iter()
            .flat_map(|c| c.present())
            .filter(|c| c.author.as_ref().is_some_and(|a| a.is(login)))
            .count() as u32;
    }

    let items_added = user
        .projects_v2
        .iter()
        .flat_map(|c| c.present())
        .flat_map(|p| p.items.iter().flat_map(|c| c.present()))
        .filter(|item| item.creator.as_ref().is_some_and(|a| a.is(login)))
        .count() as u32;

    DeepSignals {
        pr_reviews: reviews,
        issues,
        discussions,
        projects: ProjectSignals { items_added },
        sponsors_enabled: user.has_sponsors_listing.unwrap_or(false),
    }
}
