//! Completion metrics and the workflow stage derived from them.
//!
//! The stage is recomputed from the profile every time and never stored, so
//! one profile always yields one stage regardless of how it was built.

use serde::{Deserialize, Serialize};

use super::model::{Profile, SynopsisField};

/// Workflow stage, ordered by the number of substantive sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    GettingStarted,
    GatheringInfo,
    ResearchPhase,
    ReadyForSynopsis,
}

impl Stage {
    /// Map a substantive-section count to a stage.
    pub fn from_substantive_count(count: usize) -> Self {
        match count {
            0 => Self::GettingStarted,
            1..=2 => Self::GatheringInfo,
            3..=4 => Self::ResearchPhase,
            _ => Self::ReadyForSynopsis,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::GettingStarted => "Getting Started",
            Self::GatheringInfo => "Gathering Information",
            Self::ResearchPhase => "Research Phase",
            Self::ReadyForSynopsis => "Ready for Synopsis",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::GettingStarted => "GETTING_STARTED",
            Self::GatheringInfo => "GATHERING_INFO",
            Self::ResearchPhase => "RESEARCH_PHASE",
            Self::ReadyForSynopsis => "READY_FOR_SYNOPSIS",
        };
        f.write_str(s)
    }
}

/// Snapshot of how complete a profile is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    /// Canonical fields with any non-empty value.
    pub filled_count: usize,
    pub total: usize,
    /// `filled_count / total`, 0.0..=1.0.
    pub fraction: f64,
    /// `fraction` as a whole percentage, for display.
    pub percent: u8,
    /// Fields longer than the substantive threshold.
    pub substantive_count: usize,
    pub stage: Stage,
    /// Canonical fields still empty, in display order.
    pub missing_fields: Vec<SynopsisField>,
}

/// Computes `ProgressReport`s for a fixed substantive-length threshold.
#[derive(Debug, Clone, Copy)]
pub struct ProgressTracker {
    substantive_min_chars: usize,
}

impl ProgressTracker {
    pub fn new(substantive_min_chars: usize) -> Self {
        Self { substantive_min_chars }
    }

    /// Whether a value counts toward stage progression.
    pub fn is_substantive(&self, value: &str) -> bool {
        value.trim().chars().count() > self.substantive_min_chars
    }

    pub fn substantive_count(&self, profile: &Profile) -> usize {
        profile.iter().filter(|(_, v)| self.is_substantive(v)).count()
    }

    pub fn report(&self, profile: &Profile) -> ProgressReport {
        let total = SynopsisField::ALL.len();
        let filled_count = profile.filled_count();
        let substantive_count = self.substantive_count(profile);
        let fraction = filled_count as f64 / total as f64;

        ProgressReport {
            filled_count,
            total,
            fraction,
            percent: (fraction * 100.0).round() as u8,
            substantive_count,
            stage: Stage::from_substantive_count(substantive_count),
            missing_fields: SynopsisField::ALL
                .into_iter()
                .filter(|f| !profile.is_filled(*f))
                .collect(),
        }
    }
}
