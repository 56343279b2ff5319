//! TurnEngine: one conversation turn from utterance to next session state.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::SynopsisConfig;
use crate::llm::LlmProvider;

use super::extractor::ConversationExtractor;
use super::model::{DialogueTurn, Profile, SessionRecord, SynopsisField};
use super::progress::{ProgressReport, ProgressTracker};
use super::prompts::{READY_NOTICE, RESEARCH_NOTICE};
use super::readiness::ReadinessGate;
use super::research::{ResearchOrchestrator, ResearchPayload, ResearchTrigger};

/// What the caller gets back for one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnResponse {
    /// Extractor reply as kept in the extractor history.
    pub response: String,
    /// Reply plus annotations, as shown to the user.
    pub display_response: String,
    pub profile: Profile,
    pub updated_fields: Vec<SynopsisField>,
    pub extraction_failed: bool,
    pub research_triggered: bool,
    /// `None` when research was not attempted on this turn.
    pub research: Option<ResearchPayload>,
    pub progress: ProgressReport,
    pub generation_unlocked: bool,
    pub ready_notice: bool,
}

/// Next session state plus the response for the turn that produced it.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub record: SessionRecord,
    pub response: TurnResponse,
}

pub struct TurnEngine {
    extractor: ConversationExtractor,
    trigger: ResearchTrigger,
    research: Arc<ResearchOrchestrator>,
    tracker: ProgressTracker,
    gate: ReadinessGate,
}

impl TurnEngine {
    pub fn new(llm: Arc<dyn LlmProvider>, research: Arc<ResearchOrchestrator>, config: &SynopsisConfig) -> Self {
        Self {
            extractor: ConversationExtractor::new(llm, config.extract_timeout, config.history_window),
            trigger: ResearchTrigger::from_config(config),
            research,
            tracker: ProgressTracker::new(config.substantive_min_chars),
            gate: ReadinessGate::new(config.unlock_threshold, config.notice_threshold),
        }
    }

    pub fn tracker(&self) -> ProgressTracker {
        self.tracker
    }

    pub fn gate(&self) -> ReadinessGate {
        self.gate
    }

    /// Run extract, merge, research, progress and readiness for one utterance.
    ///
    /// The record is consumed and the next one returned; nothing is persisted
    /// here.
    pub async fn run(&self, mut record: SessionRecord, utterance: &str) -> TurnOutcome {
        let extraction = self
            .extractor
            .extract(utterance, &record.history, &record.profile)
            .await;

        let mut research = None;
        let mut ready_notice = false;
        let progress;

        if extraction.failed {
            progress = self.tracker.report(&record.profile);
        } else {
            record.profile = extraction.profile;

            if self.trigger.should_trigger(&record.profile, &record.flags) {
                research = self.research.run(&record.profile).await;
                record.flags.auto_research_done = true;
                if research.is_some() {
                    record.research = research.clone();
                }
            }

            progress = self.tracker.report(&record.profile);
            ready_notice = self.gate.evaluate(&progress, &mut record.flags).show_notice;
            if ready_notice {
                info!(session_id = %record.session_id, "Profile ready for synopsis generation");
            }
        }

        let generation_unlocked = self.gate.generation_unlocked(&progress);
        let display_response = annotate(
            &extraction.response,
            research.is_some(),
            &extraction.updated_fields,
            ready_notice,
        );

        record.history.push(DialogueTurn::user(utterance));
        record.history.push(DialogueTurn::assistant(extraction.response.clone()));
        record.display.push(DialogueTurn::user(utterance));
        record.display.push(DialogueTurn::assistant(display_response.clone()));

        debug!(
            session_id = %record.session_id,
            stage = %progress.stage,
            filled = progress.filled_count,
            "Turn complete"
        );

        TurnOutcome {
            response: TurnResponse {
                response: extraction.response,
                display_response,
                profile: record.profile.clone(),
                updated_fields: extraction.updated_fields,
                extraction_failed: extraction.failed,
                research_triggered: research.is_some(),
                research,
                progress,
                generation_unlocked,
                ready_notice,
            },
            record,
        }
    }
}

/// Build the display copy of a reply.
fn annotate(response: &str, researched: bool, updated: &[SynopsisField], ready: bool) -> String {
    let mut text = response.to_string();
    if researched {
        text.push_str("\n\n");
        text.push_str(RESEARCH_NOTICE);
    }
    if !updated.is_empty() {
        let labels: Vec<&str> = updated.iter().map(|f| f.label()).collect();
        text.push_str(&format!("\n\n*Updated: {}*", labels.join(", ")));
    }
    if ready {
        text.push_str("\n\n");
        text.push_str(READY_NOTICE);
    }
    text
}
