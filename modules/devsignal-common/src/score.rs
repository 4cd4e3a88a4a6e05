use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::aggregate::{ProficiencyTier, ProfileAggregate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Archetype {
    Architect,
    ProlificExperimenter,
    FocusedCraftsperson,
    ActiveBuilder,
    EmergingDeveloper,
}

impl Archetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Architect => "architect",
            Archetype::ProlificExperimenter => "prolific-experimenter",
            Archetype::FocusedCraftsperson => "focused-craftsperson",
            Archetype::ActiveBuilder => "active-builder",
            Archetype::EmergingDeveloper => "emerging-developer",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the archetype table as evaluated for this aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub archetype: Archetype,
    pub matched: bool,
}

/// Derived analytics. Recomputed every run, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub activity_score: u8,
    pub language_proficiency: BTreeMap<String, ProficiencyTier>,
    pub impact: Level,
    pub recent_activity: Level,
    pub archetype: Archetype,
    /// Rules in table order, up to and including the first match.
    pub archetype_rules: Vec<RuleEvaluation>,
}

/// What the run hands to whatever renders it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileReport {
    pub aggregate: ProfileAggregate,
    pub score: ScoreResult,
}
