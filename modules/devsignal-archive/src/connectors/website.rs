use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devsignal_common::config::MAX_WEBSITES_CEILING;
use devsignal_common::{
    CandidateUrl, FetchError, Identity, RawResult, SiteExtract, SiteFailure, SourcePayload,
    SourceTag, WebsiteCrawl,
};
use tracing::{info, warn};

use super::SourceConnector;
use crate::cache::{CacheKey, CacheStore};
use crate::fetchers::PageFetcher;
use crate::retry::RetryPolicy;
use crate::sections::parse_site;

#[derive(Debug, Clone, Default)]
pub struct WebsiteParams {
    /// Ranked candidates; only crawlable ones are visited.
    pub targets: Vec<CandidateUrl>,
    pub max_sites: usize,
}

/// Crawls personal sites. Each URL is cached and fails on its own.
pub struct WebsiteConnector {
    fetcher: Arc<dyn PageFetcher>,
    cache: Arc<CacheStore>,
    crawl_timeout: Duration,
    retry: RetryPolicy,
}

impl WebsiteConnector {
    pub fn new(fetcher: Arc<dyn PageFetcher>, cache: Arc<CacheStore>) -> Self {
        Self {
            fetcher,
            cache,
            crawl_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_crawl_timeout(mut self, timeout: Duration) -> Self {
        self.crawl_timeout = timeout;
        self
    }

    async fn crawl_one(&self, identity: &Identity, url: &str) -> Result<SiteExtract, FetchError> {
        let key = CacheKey::new(identity, SourceTag::Website).with_param("url", url);
        let fetcher = self.fetcher.as_ref();
        let timeout = self.crawl_timeout;
        let retry = self.retry;

        let raw = self
            .cache
            .get_or_fetch(&key, || async move {
                // The timeout bounds each attempt; retries get their own budget.
                let markdown = retry
                    .run("website crawl", || async move {
                        tokio::time::timeout(timeout, fetcher.markdown(url))
                            .await
                            .map_err(|_| {
                                FetchError::Timeout(format!("{url} not crawled within {timeout:?}"))
                            })?
                    })
                    .await?;
                let site = parse_site(url, &markdown);
                Ok::<_, FetchError>(SourcePayload::Website(WebsiteCrawl {
                    sites: vec![site],
                    failures: Vec::new(),
                }))
            })
            .await?;

        match raw.payload {
            SourcePayload::Website(mut crawl) => crawl
                .sites
                .pop()
                .ok_or_else(|| FetchError::Parse(format!("cached crawl for {url} is empty"))),
            _ => Err(FetchError::Parse(format!("unexpected cached payload for {url}"))),
        }
    }
}

#[async_trait]
impl SourceConnector for WebsiteConnector {
    type Params = WebsiteParams;

    fn source(&self) -> SourceTag {
        SourceTag::Website
    }

    async fn fetch(
        &self,
        identity: &Identity,
        params: &WebsiteParams,
    ) -> Result<RawResult, FetchError> {
        let max = params.max_sites.min(MAX_WEBSITES_CEILING);
        let targets: Vec<&CandidateUrl> = params
            .targets
            .iter()
            .filter(|c| c.is_crawlable())
            .take(max)
            .collect();

        let outcomes =
            futures::future::join_all(targets.iter().map(|c| self.crawl_one(identity, &c.url)))
                .await;

        let mut crawl = WebsiteCrawl::default();
        for (candidate, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(site) => crawl.sites.push(site),
                Err(e) => {
                    warn!(url = %candidate.url, error = %e, "Website crawl failed");
                    crawl.failures.push(SiteFailure {
                        url: candidate.url.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            crawled = crawl.sites.len(),
            failed = crawl.failures.len(),
            "Website enrichment finished"
        );
        Ok(RawResult::new(SourcePayload::Website(crawl), self.cache.now()))
    }
}
