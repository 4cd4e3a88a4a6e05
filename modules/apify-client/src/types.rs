use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Actor run metadata returned when a run starts and while polling it.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunData {
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self.status.as_str(), "FAILED" | "ABORTED" | "TIMED-OUT")
    }
}

// --- LinkedIn profile scraper ---

/// Input for the LinkedIn profile scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct LinkedInProfileInput {
    #[serde(rename = "profileUrls")]
    pub profile_urls: Vec<String>,
}

/// One scraped LinkedIn profile from the actor's dataset.
/// The actor omits fields the profile does not show, so everything is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedInProfile {
    pub linkedin_url: Option<String>,
    pub full_name: Option<String>,
    pub headline: Option<String>,
    pub about: Option<String>,
    pub address_with_country: Option<String>,
    pub address_without_country: Option<String>,
    pub industry: Option<String>,
    pub connections: Option<u32>,
    pub followers: Option<u32>,
    #[serde(default)]
    pub experiences: Vec<LinkedInExperience>,
    #[serde(default)]
    pub educations: Vec<LinkedInEducation>,
    #[serde(default)]
    pub skills: Vec<LinkedInSkill>,
    #[serde(default)]
    pub license_and_certificates: Vec<LinkedInCertification>,
}

impl LinkedInProfile {
    /// Location as displayed, preferring the form that includes the country.
    pub fn location(&self) -> Option<&str> {
        self.address_with_country
            .as_deref()
            .or(self.address_without_country.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedInExperience {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub caption: Option<String>,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedInEducation {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedInSkill {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedInCertification {
    pub title: Option<String>,
    pub subtitle: Option<String>,
}
