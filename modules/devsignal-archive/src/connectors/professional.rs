use std::sync::Arc;

use async_trait::async_trait;
use devsignal_common::{FetchError, Identity, RawResult, SourcePayload, SourceTag};
use tracing::info;

use super::SourceConnector;
use crate::cache::{CacheKey, CacheStore};
use crate::discovery::normalize_professional_reference;
use crate::fetchers::ProfessionalNetworkApi;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfessionalParams {
    /// Any accepted reference form; normalized before fetching.
    pub reference: String,
}

/// One professional-network profile per run: the highest-ranked reference.
pub struct ProfessionalConnector {
    api: Arc<dyn ProfessionalNetworkApi>,
    cache: Arc<CacheStore>,
    retry: RetryPolicy,
}

impl ProfessionalConnector {
    pub fn new(api: Arc<dyn ProfessionalNetworkApi>, cache: Arc<CacheStore>) -> Self {
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
impl SourceConnector for ProfessionalConnector {
    type Params = ProfessionalParams;

    fn source(&self) -> SourceTag {
        SourceTag::ProfessionalNetwork
    }

    async fn fetch(
        &self,
        identity: &Identity,
        params: &ProfessionalParams,
    ) -> Result<RawResult, FetchError> {
        let url = normalize_professional_reference(&params.reference).ok_or_else(|| {
            FetchError::Parse(format!(
                "unrecognized professional profile reference: {}",
                params.reference
            ))
        })?;
        let key = CacheKey::new(identity, SourceTag::ProfessionalNetwork).with_param("url", &url);
        let api = self.api.as_ref();
        let url = url.as_str();
        let retry = self.retry;

        self.cache
            .get_or_fetch(&key, || async move {
                let profile = retry.run("professional profile", || api.profile(url)).await?;
                info!(url, name = ?profile.full_name, "Professional profile fetched");
                Ok::<_, FetchError>(SourcePayload::ProfessionalNetwork(profile))
            })
            .await
    }
}
