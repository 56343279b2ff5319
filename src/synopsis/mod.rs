//! Synopsis assist core: profile extraction, automatic research, progress
//! tracking and the readiness gate, plus the manager and routes around them.

pub mod document;
pub mod extractor;
pub mod manager;
pub mod model;
pub mod progress;
pub mod prompts;
pub mod readiness;
pub mod research;
pub mod routes;
pub mod turn;

pub use document::{DocumentRef, DocumentRenderer, MarkdownRenderer, SynopsisDocument};
pub use extractor::ConversationExtractor;
pub use manager::{SessionStatus, SessionView, SynopsisManager};
pub use model::{DialogueTurn, Profile, SessionFlags, SessionRecord, SynopsisField};
pub use progress::{ProgressReport, ProgressTracker, Stage};
pub use readiness::{ReadinessDecision, ReadinessGate};
pub use research::{ResearchOrchestrator, ResearchPayload, ResearchTrigger};
pub use routes::{SynopsisRouteState, synopsis_routes};
pub use turn::{TurnEngine, TurnResponse};
