//! Readiness gate: document-generation unlock and the one-time ready notice.

use serde::Serialize;

use super::model::SessionFlags;
use super::progress::ProgressReport;

/// Outcome of evaluating the gate after a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadinessDecision {
    /// Document generation may be invoked.
    pub generation_unlocked: bool,
    /// The ready notice should be shown on this turn.
    pub show_notice: bool,
}

/// Two independent decisions from two distinct metrics: unlock uses the plain
/// filled count, the notice uses the substantive count.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessGate {
    unlock_threshold: usize,
    notice_threshold: usize,
}

impl ReadinessGate {
    pub fn new(unlock_threshold: usize, notice_threshold: usize) -> Self {
        Self {
            unlock_threshold,
            notice_threshold,
        }
    }

    pub fn unlock_threshold(&self) -> usize {
        self.unlock_threshold
    }

    pub fn generation_unlocked(&self, progress: &ProgressReport) -> bool {
        progress.filled_count >= self.unlock_threshold
    }

    /// Sections still needed before generation unlocks.
    pub fn sections_needed(&self, progress: &ProgressReport) -> usize {
        self.unlock_threshold.saturating_sub(progress.filled_count)
    }

    /// Evaluate the gate and consume the notice latch if it fires.
    ///
    /// Once `flags.ready_notice_shown` is set it stays set; only a session
    /// reset clears it.
    pub fn evaluate(&self, progress: &ProgressReport, flags: &mut SessionFlags) -> ReadinessDecision {
        let show_notice =
            !flags.ready_notice_shown && progress.substantive_count >= self.notice_threshold;
        if show_notice {
            flags.ready_notice_shown = true;
        }
        ReadinessDecision {
            generation_unlocked: self.generation_unlocked(progress),
            show_notice,
        }
    }

    /// Evaluate without touching the latch (for read-only status views).
    pub fn peek(&self, progress: &ProgressReport, flags: &SessionFlags) -> ReadinessDecision {
        let mut scratch = *flags;
        self.evaluate(progress, &mut scratch)
    }
}
