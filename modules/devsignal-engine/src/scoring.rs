// Pure analytics over a merged aggregate. Same aggregate in, same ScoreResult out.

use std::collections::BTreeMap;

use devsignal_common::config::ScoringConfig;
use devsignal_common::{
    Archetype, ContributionStats, Level, ProfileAggregate, RuleEvaluation, ScoreResult,
};

/// The facts the archetype table looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evidence {
    pub total_stars: u64,
    pub repos: usize,
    pub languages: usize,
    pub recency: Level,
}

impl Evidence {
    pub fn from_aggregate(aggregate: &ProfileAggregate, config: &ScoringConfig) -> Self {
        Self {
            total_stars: aggregate.contribution_stats.total_stars,
            repos: aggregate.repositories.len(),
            languages: aggregate.languages.len(),
            recency: recent_activity_level(&aggregate.contribution_stats, config),
        }
    }
}

type Rule = fn(&Evidence, &ScoringConfig) -> bool;

/// Strongest evidence first; the first rule that matches wins. The last row always matches.
const ARCHETYPE_TABLE: &[(Archetype, Rule)] = &[
    (Archetype::Architect, is_architect),
    (Archetype::ProlificExperimenter, is_prolific_experimenter),
    (Archetype::FocusedCraftsperson, is_focused_craftsperson),
    (Archetype::ActiveBuilder, is_active_builder),
    (Archetype::EmergingDeveloper, always),
];

fn is_architect(e: &Evidence, c: &ScoringConfig) -> bool {
    e.total_stars >= c.architect_min_stars
        && e.repos >= c.architect_min_repos
        && e.languages >= c.architect_min_languages
}

fn is_prolific_experimenter(e: &Evidence, c: &ScoringConfig) -> bool {
    e.repos >= c.experimenter_min_repos
        && e.languages >= c.experimenter_min_languages
        && e.recency != Level::Low
}

fn is_focused_craftsperson(e: &Evidence, c: &ScoringConfig) -> bool {
    e.languages <= c.craftsperson_max_languages
        && e.total_stars >= c.craftsperson_min_stars
        && e.repos >= c.craftsperson_min_repos
}

fn is_active_builder(e: &Evidence, _: &ScoringConfig) -> bool {
    e.recency == Level::High
}

fn always(_: &Evidence, _: &ScoringConfig) -> bool {
    true
}

pub fn score(aggregate: &ProfileAggregate, config: &ScoringConfig) -> ScoreResult {
    let stats = &aggregate.contribution_stats;
    let evidence = Evidence::from_aggregate(aggregate, config);
    let (archetype, archetype_rules) = classify(&evidence, config);

    let language_proficiency: BTreeMap<String, _> = aggregate
        .languages
        .iter()
        .map(|usage| (usage.language.clone(), usage.tier))
        .collect();

    ScoreResult {
        activity_score: activity_score(stats, config),
        language_proficiency,
        impact: impact_level(stats, config),
        recent_activity: evidence.recency,
        archetype,
        archetype_rules,
    }
}

/// Weighted, capped sum of stars, forks, watchers, recent repos and repo count.
/// Always within 0..=100; no repositories scores zero.
pub fn activity_score(stats: &ContributionStats, c: &ScoringConfig) -> u8 {
    if stats.total_repos == 0 {
        return 0;
    }
    let part = |value: f64, weight: f64, cap: f64| (value * weight).clamp(0.0, cap.max(0.0));

    let total = part(stats.total_stars as f64, c.star_weight, c.star_cap)
        + part(stats.total_forks as f64, c.fork_weight, c.fork_cap)
        + part(stats.total_watchers as f64, c.watcher_weight, c.watcher_cap)
        + part(f64::from(stats.recent_repos), c.recent_repo_weight, c.recent_repo_cap)
        + part(f64::from(stats.total_repos), c.repo_count_weight, c.repo_count_cap);

    total.floor().clamp(0.0, 100.0) as u8
}

pub fn impact_level(stats: &ContributionStats, c: &ScoringConfig) -> Level {
    if stats.total_stars > c.impact_high_stars || stats.average_stars >= c.impact_high_avg_stars {
        Level::High
    } else if stats.total_stars > c.impact_medium_stars
        || stats.average_stars >= c.impact_medium_avg_stars
    {
        Level::Medium
    } else {
        Level::Low
    }
}

pub fn recent_activity_level(stats: &ContributionStats, c: &ScoringConfig) -> Level {
    let recent = stats.recent_repos as usize;
    if recent >= c.recency_high_repos {
        Level::High
    } else if recent >= c.recency_medium_repos {
        Level::Medium
    } else {
        Level::Low
    }
}

/// Walk the table in order, recording each rule up to the first match.
pub fn classify(evidence: &Evidence, config: &ScoringConfig) -> (Archetype, Vec<RuleEvaluation>) {
    let mut evaluated = Vec::new();
    for (archetype, rule) in ARCHETYPE_TABLE {
        let matched = rule(evidence, config);
        evaluated.push(RuleEvaluation {
            archetype: *archetype,
            matched,
        });
        if matched {
            return (*archetype, evaluated);
        }
    }
    (Archetype::EmergingDeveloper, evaluated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(repos: u32, stars: u64, recent: u32) -> ContributionStats {
        ContributionStats {
            total_repos: repos,
            total_stars: stars,
            recent_repos: recent,
            average_stars: stars as f64 / f64::from(repos.max(1)),
            ..Default::default()
        }
    }

    fn evidence(stars: u64, repos: usize, languages: usize, recency: Level) -> Evidence {
        Evidence {
            total_stars: stars,
            repos,
            languages,
            recency,
        }
    }

    #[test]
    fn zero_repos_score_zero() {
        let c = ScoringConfig::default();
        assert_eq!(activity_score(&stats(0, 5000, 0), &c), 0);
    }

    #[test]
    fn activity_score_is_capped_at_100() {
        let c = ScoringConfig::default();
        let huge = ContributionStats {
            total_repos: 500,
            total_stars: 1_000_000,
            total_forks: 1_000_000,
            total_watchers: 1_000_000,
            recent_repos: 500,
            ..Default::default()
        };
        assert_eq!(activity_score(&huge, &c), 100);
    }

    #[test]
    fn activity_score_floors_the_weighted_sum() {
        let c = ScoringConfig::default();
        let s = ContributionStats {
            total_repos: 3,
            total_stars: 7,
            total_forks: 2,
            total_watchers: 1,
            recent_repos: 1,
            ..Default::default()
        };
        // 3.5 + 1.6 + 0.3 + 4 + 3 = 12.4
        assert_eq!(activity_score(&s, &c), 12);
    }

    #[test]
    fn score_stays_in_range_for_hostile_weights() {
        let c = ScoringConfig {
            star_weight: -10.0,
            star_cap: 500.0,
            fork_cap: -3.0,
            ..Default::default()
        };
        let s = ContributionStats {
            total_repos: 10,
            total_stars: 100,
            total_forks: 100,
            ..Default::default()
        };
        // Negative contributions clamp to zero; only the repo count remains.
        assert_eq!(activity_score(&s, &c), 10);
    }

    #[test]
    fn impact_thresholds() {
        let c = ScoringConfig::default();
        assert_eq!(impact_level(&stats(10, 101, 0), &c), Level::High);
        assert_eq!(impact_level(&stats(2, 50, 0), &c), Level::High);
        assert_eq!(impact_level(&stats(10, 26, 0), &c), Level::Medium);
        assert_eq!(impact_level(&stats(2, 20, 0), &c), Level::Medium);
        assert_eq!(impact_level(&stats(10, 25, 0), &c), Level::Low);
    }

    #[test]
    fn recency_levels() {
        let c = ScoringConfig::default();
        assert_eq!(recent_activity_level(&stats(5, 0, 3), &c), Level::High);
        assert_eq!(recent_activity_level(&stats(5, 0, 1), &c), Level::Medium);
        assert_eq!(recent_activity_level(&stats(5, 0, 0), &c), Level::Low);
    }

    #[test]
    fn first_matching_rule_wins() {
        let c = ScoringConfig::default();

        let (a, rules) = classify(&evidence(300, 25, 6, Level::High), &c);
        assert_eq!(a, Archetype::Architect);
        assert_eq!(rules.len(), 1);

        let (a, _) = classify(&evidence(10, 25, 6, Level::Medium), &c);
        assert_eq!(a, Archetype::ProlificExperimenter);

        let (a, _) = classify(&evidence(10, 25, 6, Level::Low), &c);
        assert_eq!(a, Archetype::EmergingDeveloper);

        let (a, _) = classify(&evidence(60, 4, 1, Level::Low), &c);
        assert_eq!(a, Archetype::FocusedCraftsperson);

        let (a, rules) = classify(&evidence(0, 4, 3, Level::High), &c);
        assert_eq!(a, Archetype::ActiveBuilder);
        assert_eq!(
            rules.iter().filter(|r| !r.matched).count(),
            3,
            "three rules rejected before the match"
        );
    }

    #[test]
    fn empty_evidence_is_an_emerging_developer() {
        let (a, rules) = classify(&evidence(0, 0, 0, Level::Low), &ScoringConfig::default());
        assert_eq!(a, Archetype::EmergingDeveloper);
        assert_eq!(rules.len(), 5);
        assert!(rules.last().is_some_and(|r| r.matched));
    }
}
