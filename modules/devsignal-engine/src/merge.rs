// Folds connector outputs into one ProfileAggregate. Merge itself never fails:
// every optional source has a defined empty shape and a status.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use devsignal_archive::sections::sorted_unique;
use devsignal_common::config::{Config, ScoringConfig};
use devsignal_common::{
    CandidateUrl, ContributionStats, DeepSignals, DeepSignalsSection, Identity,
    IdentityAttributes, LanguageUsage, PrimaryProfile, ProfessionalProfile, ProfessionalSection,
    ProficiencyTier, ProfileAggregate, RepositoryMetrics, RepositoryRecord, SectionStatus,
    SiteExtract, SourceTag, WebsiteCrawl, WebsiteSection,
};
use tracing::debug;

use crate::correlation::correlate;

/// What one optional source produced this run.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SourceOutcome<T> {
    #[default]
    NotRequested,
    /// Requested, but there was nothing to point it at.
    NothingToFetch,
    Fetched(T),
    Failed(String),
}

impl<T> SourceOutcome<T> {
    fn status(&self) -> SectionStatus {
        match self {
            SourceOutcome::NotRequested => SectionStatus::NotRequested,
            SourceOutcome::NothingToFetch => SectionStatus::Empty,
            SourceOutcome::Fetched(_) => SectionStatus::Present,
            SourceOutcome::Failed(reason) => SectionStatus::Degraded {
                reason: reason.clone(),
            },
        }
    }

    fn fetched(self) -> Option<T> {
        match self {
            SourceOutcome::Fetched(value) => Some(value),
            _ => None,
        }
    }
}

/// Everything the merge needs. The primary profile is the only mandatory part.
#[derive(Debug, Clone)]
pub struct MergeInput {
    pub identity: Identity,
    pub primary: PrimaryProfile,
    /// When the primary payload was fetched; becomes the aggregate's `as_of`.
    pub fetched_at: DateTime<Utc>,
    pub candidate_urls: Vec<CandidateUrl>,
    pub professional_references: Vec<String>,
    pub deep_signals: SourceOutcome<DeepSignals>,
    pub website: SourceOutcome<WebsiteCrawl>,
    pub professional: SourceOutcome<ProfessionalProfile>,
}

impl MergeInput {
    /// Primary data only; every optional source not requested.
    pub fn primary_only(identity: Identity, primary: PrimaryProfile, fetched_at: DateTime<Utc>) -> Self {
        Self {
            identity,
            primary,
            fetched_at,
            candidate_urls: Vec::new(),
            professional_references: Vec::new(),
            deep_signals: SourceOutcome::NotRequested,
            website: SourceOutcome::NotRequested,
            professional: SourceOutcome::NotRequested,
        }
    }
}

pub fn merge(input: MergeInput, config: &Config) -> ProfileAggregate {
    let scoring = &config.scoring;
    let as_of = input.fetched_at;
    let PrimaryProfile {
        login,
        name,
        bio,
        location,
        company,
        blog,
        twitter_username,
        email,
        hireable,
        public_repos,
        followers,
        following,
        created_at,
        repositories: records,
        profile_readme,
        organizations,
        gists,
        social_accounts,
    } = input.primary;

    let languages = language_histogram(&records, scoring);

    let mut repositories: Vec<RepositoryMetrics> = records
        .into_iter()
        .map(|record| repository_metrics(record, as_of, scoring))
        .collect();
    repositories.sort_by(|a, b| {
        b.record
            .stars
            .cmp(&a.record.stars)
            .then_with(|| a.record.name.cmp(&b.record.name))
    });
    let featured_repositories = repositories
        .iter()
        .take(config.github.max_featured_repos)
        .map(|r| r.record.name.clone())
        .collect();
    let contribution_stats = contribution_stats(&repositories, scoring);

    let mut sources = BTreeMap::new();
    sources.insert(SourceTag::Primary, SectionStatus::Present);
    sources.insert(SourceTag::DeepSignals, input.deep_signals.status());
    sources.insert(SourceTag::Website, website_status(&input.website));
    sources.insert(SourceTag::ProfessionalNetwork, input.professional.status());

    let deep_signals = DeepSignalsSection {
        signals: input.deep_signals.fetched(),
    };
    let website = website_section(input.website.fetched().unwrap_or_default());
    let professional = ProfessionalSection {
        profile: input.professional.fetched(),
    };

    let attributes = IdentityAttributes {
        login,
        name,
        bio,
        location,
        company,
        blog,
        twitter_username,
        email,
        hireable,
        public_repos,
        followers,
        following,
        created_at,
    };
    let correlation = correlate(&attributes, &website, &professional);

    debug!(
        identity = %input.identity,
        repos = repositories.len(),
        languages = languages.len(),
        checks = correlation.checks.len(),
        "Aggregate merged"
    );

    ProfileAggregate {
        identity: input.identity,
        as_of,
        attributes,
        repositories,
        featured_repositories,
        languages,
        contribution_stats,
        profile_readme,
        organizations,
        gists,
        social_accounts,
        candidate_urls: input.candidate_urls,
        professional_references: input.professional_references,
        website,
        professional,
        deep_signals,
        sources,
        correlation,
    }
}

pub fn tier_for(share: f64, scoring: &ScoringConfig) -> ProficiencyTier {
    if share >= scoring.advanced_share {
        ProficiencyTier::Advanced
    } else if share >= scoring.intermediate_share {
        ProficiencyTier::Intermediate
    } else {
        ProficiencyTier::Beginner
    }
}

/// Summed bytes per language across repositories, largest first.
pub fn language_histogram(repos: &[RepositoryRecord], scoring: &ScoringConfig) -> Vec<LanguageUsage> {
    let mut totals: BTreeMap<&str, (u64, u32)> = BTreeMap::new();
    for repo in repos {
        for (language, bytes) in &repo.languages {
            let entry = totals.entry(language.as_str()).or_default();
            entry.0 += bytes;
            entry.1 += 1;
        }
    }

    let all: u64 = totals.values().map(|(bytes, _)| bytes).sum();
    let mut usage: Vec<LanguageUsage> = totals
        .into_iter()
        .filter(|(_, (bytes, _))| *bytes > 0)
        .map(|(language, (bytes, repositories))| {
            let share = bytes as f64 / all as f64;
            LanguageUsage {
                language: language.to_string(),
                bytes,
                share: round_to(share, 4),
                tier: tier_for(share, scoring),
                repositories,
            }
        })
        .collect();
    usage.sort_by(|a, b| {
        b.bytes
            .cmp(&a.bytes)
            .then_with(|| a.language.cmp(&b.language))
    });
    usage
}

fn repository_metrics(
    record: RepositoryRecord,
    as_of: DateTime<Utc>,
    scoring: &ScoringConfig,
) -> RepositoryMetrics {
    let days_since_update = record
        .updated_at
        .map(|updated| (as_of - updated).num_days().max(0));
    let recently_updated = days_since_update.is_some_and(|d| d < scoring.recent_window_days);
    let documented = record.has_wiki || record.description.is_some();
    let licensed = record.license.is_some();
    RepositoryMetrics {
        record,
        days_since_update,
        recently_updated,
        documented,
        licensed,
    }
}

fn contribution_stats(repos: &[RepositoryMetrics], scoring: &ScoringConfig) -> ContributionStats {
    let within = |days: i64| {
        repos
            .iter()
            .filter(|r| r.days_since_update.is_some_and(|d| d < days))
            .count() as u32
    };
    let total_repos = repos.len() as u32;
    let total_stars: u64 = repos.iter().map(|r| u64::from(r.record.stars)).sum();
    let total_forks: u64 = repos.iter().map(|r| u64::from(r.record.forks)).sum();
    let documented_repos = repos.iter().filter(|r| r.documented).count() as u32;
    let licensed_repos = repos.iter().filter(|r| r.licensed).count() as u32;
    let engagement_ratio = if total_stars > 0 {
        round_to(total_forks as f64 / total_stars as f64, 2)
    } else {
        0.0
    };
    let health = f64::from(documented_repos + licensed_repos) / f64::from(total_repos.max(1));

    ContributionStats {
        total_repos,
        total_stars,
        total_forks,
        total_watchers: repos.iter().map(|r| u64::from(r.record.watchers)).sum(),
        recent_repos: within(scoring.recent_window_days),
        active_repos: within(scoring.active_window_days),
        documented_repos,
        licensed_repos,
        average_stars: round_to(total_stars as f64 / f64::from(total_repos.max(1)), 1),
        total_open_issues: repos.iter().map(|r| u64::from(r.record.open_issues)).sum(),
        total_release_downloads: repos.iter().map(|r| r.record.total_downloads()).sum(),
        engagement_ratio,
        community_health: round_to(health * 100.0, 1),
    }
}

fn website_section(crawl: WebsiteCrawl) -> WebsiteSection {
    let skills = sorted_unique(crawl.sites.iter().flat_map(|s| s.skills.clone()).collect());
    let technologies = sorted_unique(
        crawl
            .sites
            .iter()
            .flat_map(|s| s.technologies.clone())
            .collect(),
    );
    let services = gather(&crawl.sites, |s| &s.services);
    let clients = gather(&crawl.sites, |s| &s.clients);
    let achievements = gather(&crawl.sites, |s| &s.achievements);
    let contact = gather(&crawl.sites, |s| &s.contact);
    WebsiteSection {
        sites: crawl.sites,
        skills,
        technologies,
        services,
        clients,
        achievements,
        contact,
    }
}

/// One list field across sites, in crawl order, first spelling kept.
fn gather(sites: &[SiteExtract], field: impl Fn(&SiteExtract) -> &Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    sites
        .iter()
        .flat_map(field)
        .filter(|item| seen.insert(item.to_lowercase()))
        .cloned()
        .collect()
}

/// A crawl where every site failed is degraded, not empty.
fn website_status(outcome: &SourceOutcome<WebsiteCrawl>) -> SectionStatus {
    match outcome {
        SourceOutcome::Fetched(crawl) if crawl.sites.is_empty() && !crawl.failures.is_empty() => {
            let reason = crawl
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.url, f.reason))
                .collect::<Vec<_>>()
                .join("; ");
            SectionStatus::Degraded { reason }
        }
        SourceOutcome::Fetched(crawl) if crawl.sites.is_empty() => SectionStatus::Empty,
        other => other.status(),
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
