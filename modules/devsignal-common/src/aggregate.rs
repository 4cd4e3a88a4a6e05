use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    CandidateUrl, DeepSignals, GistRecord, Identity, OrganizationRecord, ProfessionalProfile,
    RepositoryRecord, SiteExtract, SocialLink, SourceTag,
};

/// The merged record for one run. Built once by the merge engine, then only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileAggregate {
    pub identity: Identity,
    /// Fetch time of the primary payload. Recency is measured against this, not the wall clock.
    pub as_of: DateTime<Utc>,
    pub attributes: IdentityAttributes,
    pub repositories: Vec<RepositoryMetrics>,
    /// Names of the top repositories by stars.
    pub featured_repositories: Vec<String>,
    pub languages: Vec<LanguageUsage>,
    pub contribution_stats: ContributionStats,
    pub profile_readme: Option<String>,
    pub organizations: Vec<OrganizationRecord>,
    pub gists: Vec<GistRecord>,
    pub social_accounts: Vec<SocialLink>,
    pub candidate_urls: Vec<CandidateUrl>,
    pub professional_references: Vec<String>,
    pub website: WebsiteSection,
    pub professional: ProfessionalSection,
    pub deep_signals: DeepSignalsSection,
    pub sources: BTreeMap<SourceTag, SectionStatus>,
    pub correlation: CorrelationReport,
}

impl ProfileAggregate {
    pub fn total_stars(&self) -> u64 {
        self.contribution_stats.total_stars
    }

    pub fn status(&self, source: SourceTag) -> SectionStatus {
        self.sources
            .get(&source)
            .cloned()
            .unwrap_or(SectionStatus::NotRequested)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityAttributes {
    pub login: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub blog: Option<String>,
    pub twitter_username: Option<String>,
    pub email: Option<String>,
    pub hireable: Option<bool>,
    pub public_repos: u32,
    pub followers: u32,
    pub following: u32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryMetrics {
    #[serde(flatten)]
    pub record: RepositoryRecord,
    /// Whole days between the last update and `as_of`.
    pub days_since_update: Option<i64>,
    pub recently_updated: bool,
    pub documented: bool,
    pub licensed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProficiencyTier {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageUsage {
    pub language: String,
    pub bytes: u64,
    /// Fraction of all counted bytes, 0.0..=1.0.
    pub share: f64,
    pub tier: ProficiencyTier,
    pub repositories: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContributionStats {
    pub total_repos: u32,
    pub total_stars: u64,
    pub total_forks: u64,
    pub total_watchers: u64,
    pub recent_repos: u32,
    pub active_repos: u32,
    pub documented_repos: u32,
    pub licensed_repos: u32,
    pub average_stars: f64,
    pub total_open_issues: u64,
    pub total_release_downloads: u64,
    /// Forks per star, rounded to two places; 0 without stars.
    pub engagement_ratio: f64,
    /// Documented plus licensed repositories over all repositories, as a percentage.
    pub community_health: f64,
}

// --- Optional sections ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebsiteSection {
    pub sites: Vec<SiteExtract>,
    /// Union across sites, sorted and deduplicated case-insensitively.
    pub skills: Vec<String>,
    pub technologies: Vec<String>,
    /// Concatenated across sites in crawl order, duplicates dropped.
    pub services: Vec<String>,
    pub clients: Vec<String>,
    pub achievements: Vec<String>,
    pub contact: Vec<String>,
}

impl WebsiteSection {
    /// First non-empty headline among crawled sites, in crawl order.
    pub fn headline(&self) -> Option<&str> {
        self.sites.iter().find_map(|s| non_blank(s.headline.as_deref()))
    }

    pub fn location(&self) -> Option<&str> {
        self.sites.iter().find_map(|s| non_blank(s.location.as_deref()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalSection {
    pub profile: Option<ProfessionalProfile>,
}

impl ProfessionalSection {
    pub fn headline(&self) -> Option<&str> {
        non_blank(self.profile.as_ref()?.headline.as_deref())
    }

    pub fn location(&self) -> Option<&str> {
        non_blank(self.profile.as_ref()?.location.as_deref())
    }

    pub fn full_name(&self) -> Option<&str> {
        non_blank(self.profile.as_ref()?.full_name.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepSignalsSection {
    pub signals: Option<DeepSignals>,
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

/// Outcome of one source for this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionStatus {
    NotRequested,
    Present,
    /// Requested and fetched, but nothing usable came back.
    Empty,
    Degraded { reason: String },
}

// --- Correlation ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
    Consistent,
    Divergent,
    NotComparable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationCheck {
    pub name: String,
    pub left: Option<String>,
    pub right: Option<String>,
    pub outcome: Consistency,
}

/// Informational cross-source checks. Never affects scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub checks: Vec<CorrelationCheck>,
}

impl CorrelationReport {
    pub fn get(&self, name: &str) -> Option<&CorrelationCheck> {
        self.checks.iter().find(|c| c.name == name)
    }
}
