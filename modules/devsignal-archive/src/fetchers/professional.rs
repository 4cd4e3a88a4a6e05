use apify_client::{ApifyClient, LinkedInProfile};
use async_trait::async_trait;
use devsignal_common::{EducationEntry, ExperienceEntry, FetchError, ProfessionalProfile};

use super::ProfessionalNetworkApi;
use crate::error::from_apify;

#[async_trait]
impl ProfessionalNetworkApi for ApifyClient {
    async fn profile(&self, url: &str) -> Result<ProfessionalProfile, FetchError> {
        let scraped = self
            .scrape_linkedin_profile(url)
            .await
            .map_err(from_apify)?
            .ok_or_else(|| FetchError::NotFound(format!("no profile data for {url}")))?;
        Ok(to_professional_profile(url, scraped))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn to_professional_profile(url: &str, p: LinkedInProfile) -> ProfessionalProfile {
    let location = p.location().map(str::to_string);

    let experience = p
        .experiences
        .into_iter()
        .map(|e| ExperienceEntry {
            title: non_blank(e.title),
            // The actor puts "Company · Full-time" in the subtitle.
            company: non_blank(
                e.subtitle
                    .map(|s| s.split('·').next().unwrap_or_default().to_string()),
            ),
            duration: non_blank(e.caption),
        })
        .filter(|e| e.title.is_some() || e.company.is_some())
        .collect();

    let education = p
        .educations
        .into_iter()
        .map(|e| EducationEntry {
            institution: non_blank(e.title),
            degree: non_blank(e.subtitle),
            years: non_blank(e.caption),
        })
        .filter(|e| e.institution.is_some())
        .collect();

    ProfessionalProfile {
        profile_url: p.linkedin_url.unwrap_or_else(|| url.to_string()),
        full_name: non_blank(p.full_name),
        headline: non_blank(p.headline),
        about: non_blank(p.about),
        location,
        industry: non_blank(p.industry),
        experience,
        education,
        skills: p.skills.into_iter().filter_map(|s| non_blank(s.title)).collect(),
        certifications: p
            .license_and_certificates
            .into_iter()
            .filter_map(|c| non_blank(c.title))
            .collect(),
    }
}
