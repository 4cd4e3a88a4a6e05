pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{
    LinkedInCertification, LinkedInEducation, LinkedInExperience, LinkedInProfile,
    LinkedInProfileInput, LinkedInSkill, RunData,
};

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

/// dev_fusion/linkedin-profile-scraper
const PROFILE_ACTOR: &str = "dev_fusion~Linkedin-Profile-Scraper";

/// Long-poll rounds before giving up on a run. Each round waits up to 60s server-side.
const MAX_POLLS: u32 = 10;

pub struct ApifyClient {
    http: reqwest::Client,
    token: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
        }
    }

    /// Send an authenticated request and decode the JSON body, mapping
    /// non-success statuses onto `ApifyError`.
    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let resp = request.bearer_auth(&self.token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::from_status(status, body));
        }
        Ok(resp.json().await?)
    }

    /// Start an actor run and return its metadata without waiting.
    pub async fn start_run<I: Serialize>(&self, actor_id: &str, input: &I) -> Result<RunData> {
        let url = format!("{BASE_URL}/acts/{actor_id}/runs");
        let envelope: ApiResponse<RunData> = self.send(self.http.post(&url).json(input)).await?;
        Ok(envelope.data)
    }

    /// Long-poll a run until it succeeds, fails, or `MAX_POLLS` rounds pass.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        let url = format!("{BASE_URL}/actor-runs/{run_id}?waitForFinish=60");
        for round in 1..=MAX_POLLS {
            let envelope: ApiResponse<RunData> = self.send(self.http.get(&url)).await?;
            let run = envelope.data;
            match run.status.as_str() {
                "SUCCEEDED" => return Ok(run),
                _ if run.is_terminal_failure() => return Err(ApifyError::RunFailed(run.status)),
                status => tracing::debug!(run_id, round, status, "Actor run not finished"),
            }
        }

        Err(ApifyError::Timeout(format!(
            "run {run_id} still running after {MAX_POLLS} polls"
        )))
    }

    pub async fn dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{BASE_URL}/datasets/{dataset_id}/items?format=json");
        self.send(self.http.get(&url)).await
    }

    /// Start, wait, then read the run's default dataset.
    pub async fn run_actor<I, T>(&self, actor_id: &str, input: &I) -> Result<Vec<T>>
    where
        I: Serialize,
        T: DeserializeOwned,
    {
        let started = self.start_run(actor_id, input).await?;
        tracing::info!(actor_id, run_id = %started.id, "Actor run started");

        let finished = self.wait_for_run(&started.id).await?;
        tracing::info!(
            run_id = %finished.id,
            dataset_id = %finished.default_dataset_id,
            "Actor run finished"
        );
        self.dataset_items(&finished.default_dataset_id).await
    }

    /// Scrape one public profile. `Ok(None)` when the actor returns nothing.
    pub async fn scrape_linkedin_profile(&self, profile_url: &str) -> Result<Option<LinkedInProfile>> {
        let input = LinkedInProfileInput {
            profile_urls: vec![profile_url.to_string()],
        };
        let profiles: Vec<LinkedInProfile> = self.run_actor(PROFILE_ACTOR, &input).await?;
        tracing::debug!(profile_url, returned = profiles.len(), "Profile scrape finished");
        Ok(profiles.into_iter().next())
    }
}
