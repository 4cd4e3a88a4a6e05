use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InvalidIdentity;

// --- Identity ---

/// GitHub's documented login ceiling.
const MAX_LOGIN_LEN: usize = 39;

/// The subject's handle on the primary platform. Every cache and fetch key is scoped to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn parse(raw: &str) -> Result<Self, InvalidIdentity> {
        let login = raw.trim().trim_start_matches('@');
        if login.is_empty() {
            return Err(InvalidIdentity::Empty);
        }
        if login.len() > MAX_LOGIN_LEN {
            return Err(InvalidIdentity::TooLong(login.to_string()));
        }
        let valid_chars = login.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid_chars || login.starts_with('-') || login.ends_with('-') {
            return Err(InvalidIdentity::BadCharacters(login.to_string()));
        }
        // Logins are case-insensitive; one subject gets one set of cache keys.
        Ok(Self(login.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Sources ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Primary,
    DeepSignals,
    Website,
    ProfessionalNetwork,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Primary => "primary",
            SourceTag::DeepSignals => "deep_signals",
            SourceTag::Website => "website",
            SourceTag::ProfessionalNetwork => "professional_network",
        }
    }

    /// TTL belongs to the source type, never to the caller.
    pub fn ttl_class(&self) -> TtlClass {
        match self {
            SourceTag::Primary => TtlClass::Profile,
            SourceTag::DeepSignals => TtlClass::DeepSignals,
            SourceTag::Website | SourceTag::ProfessionalNetwork => TtlClass::Crawl,
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlClass {
    /// Profile and repository data: 1 hour.
    Profile,
    /// GraphQL contribution signals: 2 hours.
    DeepSignals,
    /// Website and professional-network crawls: 24 hours.
    Crawl,
}

impl TtlClass {
    pub fn ttl(&self) -> Duration {
        match self {
            TtlClass::Profile => Duration::hours(1),
            TtlClass::DeepSignals => Duration::hours(2),
            TtlClass::Crawl => Duration::hours(24),
        }
    }
}

/// One connector's output. Owned by the connector until merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    pub source: SourceTag,
    pub payload: SourcePayload,
    pub fetched_at: DateTime<Utc>,
    pub ttl_class: TtlClass,
}

impl RawResult {
    pub fn new(payload: SourcePayload, fetched_at: DateTime<Utc>) -> Self {
        let source = payload.source();
        Self {
            source,
            payload,
            fetched_at,
            ttl_class: source.ttl_class(),
        }
    }
}

/// Typed payload per source. The merge engine matches on this exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SourcePayload {
    Primary(PrimaryProfile),
    DeepSignals(DeepSignals),
    Website(WebsiteCrawl),
    ProfessionalNetwork(ProfessionalProfile),
}

impl SourcePayload {
    pub fn source(&self) -> SourceTag {
        match self {
            SourcePayload::Primary(_) => SourceTag::Primary,
            SourcePayload::DeepSignals(_) => SourceTag::DeepSignals,
            SourcePayload::Website(_) => SourceTag::Website,
            SourcePayload::ProfessionalNetwork(_) => SourceTag::ProfessionalNetwork,
        }
    }
}

// --- Primary platform ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimaryProfile {
    pub login: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    /// The declared link field.
    pub blog: Option<String>,
    pub twitter_username: Option<String>,
    pub email: Option<String>,
    pub hireable: Option<bool>,
    pub public_repos: u32,
    pub followers: u32,
    pub following: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub repositories: Vec<RepositoryRecord>,
    pub profile_readme: Option<String>,
    #[serde(default)]
    pub organizations: Vec<OrganizationRecord>,
    #[serde(default)]
    pub gists: Vec<GistRecord>,
    #[serde(default)]
    pub social_accounts: Vec<SocialLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    pub login: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GistRecord {
    pub id: String,
    pub description: Option<String>,
    pub html_url: String,
    pub files_count: u32,
    /// Distinct file languages, sorted.
    pub languages: Vec<String>,
    pub comments: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// An account on another platform, declared or linked from the profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLink {
    pub platform: String,
    pub username: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub primary_language: Option<String>,
    /// Bytes per language. Empty when the breakdown could not be fetched.
    pub languages: BTreeMap<String, u64>,
    pub stars: u32,
    pub forks: u32,
    pub watchers: u32,
    pub open_issues: u32,
    pub size_kb: u64,
    pub topics: Vec<String>,
    pub license: Option<String>,
    pub has_wiki: bool,
    pub has_pages: bool,
    pub archived: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Top contributors. Empty unless extended details were fetched.
    #[serde(default)]
    pub contributors: Vec<ContributorRecord>,
    #[serde(default)]
    pub releases: Vec<ReleaseRecord>,
    #[serde(default)]
    pub workflows: Vec<WorkflowRecord>,
    #[serde(default)]
    pub has_security_policy: bool,
}

impl RepositoryRecord {
    pub fn total_downloads(&self) -> u64 {
        self.releases.iter().map(|r| r.download_count).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorRecord {
    pub login: String,
    pub contributions: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub tag_name: String,
    pub name: String,
    pub published_at: Option<DateTime<Utc>>,
    pub prerelease: bool,
    pub draft: bool,
    /// Summed over the release's assets.
    pub download_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub name: String,
    pub state: String,
    pub path: String,
}

// --- Deep signals ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepSignals {
    pub pr_reviews: ReviewSignals,
    pub issues: IssueSignals,
    pub discussions: DiscussionSignals,
    pub projects: ProjectSignals,
    pub sponsors_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSignals {
    pub total: u32,
    pub approvals: u32,
    pub changes_requested: u32,
    /// Approvals over total reviews, rounded to two places; 0 when there are none.
    pub approval_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueSignals {
    pub opened: u32,
    pub closed: u32,
    pub comments_authored: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscussionSignals {
    pub threads_started: u32,
    pub comments_authored: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSignals {
    pub items_added: u32,
}

// --- Website crawl ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebsiteCrawl {
    pub sites: Vec<SiteExtract>,
    /// URLs that were attempted and failed. Failures never abort the crawl.
    #[serde(default)]
    pub failures: Vec<SiteFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteFailure {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteType {
    Portfolio,
    Blog,
    ProfessionalServices,
    #[default]
    General,
}

/// Best-effort structured sections pulled from one personal site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteExtract {
    pub url: String,
    pub site_type: SiteType,
    pub name: Option<String>,
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub skills: Vec<String>,
    pub technologies: Vec<String>,
    pub experience: Vec<String>,
    pub education: Vec<String>,
    pub projects: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub clients: Vec<String>,
    #[serde(default)]
    pub achievements: Vec<String>,
    /// Email addresses and contact lines, in page order.
    #[serde(default)]
    pub contact: Vec<String>,
}

impl SiteExtract {
    pub fn has_professional_content(&self) -> bool {
        !(self.skills.is_empty()
            && self.technologies.is_empty()
            && self.experience.is_empty()
            && self.projects.is_empty()
            && self.services.is_empty()
            && self.achievements.is_empty())
    }
}

// --- Professional network ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalProfile {
    pub profile_url: String,
    pub full_name: Option<String>,
    pub headline: Option<String>,
    pub about: Option<String>,
    pub location: Option<String>,
    pub industry: Option<String>,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub skills: Vec<String>,
    pub certifications: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub title: Option<String>,
    pub company: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub years: Option<String>,
}

// --- Candidate URLs ---

/// Where a candidate URL was found. Declaration order is rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlOrigin {
    /// Supplied on the command line; outranks anything discovered.
    ManualOverride,
    DeclaredLink,
    Bio,
    RepositoryHomepage,
    RepositoryDescription,
    RepositoryPages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Personal,
    PlatformExcluded,
    Unverified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateUrl {
    /// The text as it appeared in the source field.
    pub raw: String,
    /// Normalized absolute URL, or the raw text when it could not be normalized.
    pub url: String,
    pub origin: UrlOrigin,
    pub verdict: Verdict,
    pub reason: Option<String>,
}

impl CandidateUrl {
    pub fn is_crawlable(&self) -> bool {
        self.verdict == Verdict::Personal
    }
}
