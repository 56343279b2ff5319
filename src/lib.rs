//! Synopsis Assist: turns a conversation into a structured project synopsis.

pub mod config;
pub mod error;
pub mod llm;
pub mod research;
pub mod store;
pub mod synopsis;

use std::path::PathBuf;
use std::sync::Arc;

use config::SynopsisConfig;
use llm::LlmProvider;
use store::SessionStore;
use synopsis::research::{SearchSource, Synthesizer};
use synopsis::{MarkdownRenderer, ResearchOrchestrator, SynopsisManager, SynopsisRouteState, TurnEngine};

/// Collaborators the synopsis core runs against.
pub struct Collaborators {
    pub store: Arc<dyn SessionStore>,
    pub llm: Arc<dyn LlmProvider>,
    pub repositories: Arc<dyn SearchSource>,
    pub papers: Arc<dyn SearchSource>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

/// Wire the manager, research orchestrator and renderer into route state.
pub fn build_state(deps: Collaborators, config: &SynopsisConfig, output_dir: impl Into<PathBuf>) -> SynopsisRouteState {
    let research = Arc::new(ResearchOrchestrator::new(
        deps.repositories,
        deps.papers,
        deps.synthesizer,
        config,
    ));
    let engine = TurnEngine::new(deps.llm, research.clone(), config);
    let manager = SynopsisManager::new(deps.store, engine, Arc::new(MarkdownRenderer::new(output_dir)));
    SynopsisRouteState {
        manager: Arc::new(manager),
        research,
    }
}
