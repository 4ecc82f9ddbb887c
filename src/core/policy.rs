//! core::policy
//!
//! Grading policy: which grades pass, what each grade is worth, and how
//! prerequisites are evaluated.
//!
//! Grade points are kept in tenths of a point so that aggregate sums are
//! exact integers. This makes an incrementally maintained GPA bit-identical
//! to a fresh recomputation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::types::Grade;

/// How far prerequisite checking reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrerequisiteMode {
    /// Only the direct edges of the target course are checked.
    #[default]
    Direct,
    /// Every course reachable through prerequisite edges is checked.
    Transitive,
}

/// The grading policy in force.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingPolicy {
    passing: BTreeSet<Grade>,
    prerequisites: PrerequisiteMode,
}

impl GradingPolicy {
    /// The default passing set.
    pub const DEFAULT_PASSING: [Grade; 4] = [Grade::A, Grade::B, Grade::C, Grade::D];

    /// The withdrawal code.
    pub const WITHDRAWAL: Grade = Grade::W;

    /// Create a policy.
    ///
    /// Withdrawal and incomplete are removed from the passing set even if
    /// supplied; configuration validation reports them as errors first.
    pub fn new(passing: impl IntoIterator<Item = Grade>, prerequisites: PrerequisiteMode) -> Self {
        let passing = passing
            .into_iter()
            .filter(|g| !matches!(g, Grade::W | Grade::I))
            .collect();
        Self {
            passing,
            prerequisites,
        }
    }

    /// Whether a grade satisfies prerequisites and earns credit.
    pub fn is_passing(&self, grade: Grade) -> bool {
        self.passing.contains(&grade)
    }

    /// Grade points in tenths (A = 40). `None` for grades that carry no
    /// points and are excluded from GPA (withdrawal, incomplete).
    pub fn points_tenths(&self, grade: Grade) -> Option<u32> {
        match grade {
            Grade::A => Some(40),
            Grade::B => Some(30),
            Grade::C => Some(20),
            Grade::D => Some(10),
            Grade::F => Some(0),
            Grade::W | Grade::I => None,
        }
    }

    pub fn prerequisite_mode(&self) -> PrerequisiteMode {
        self.prerequisites
    }

    pub fn passing_grades(&self) -> impl Iterator<Item = Grade> + '_ {
        self.passing.iter().copied()
    }
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PASSING, PrerequisiteMode::Direct)
    }
}
