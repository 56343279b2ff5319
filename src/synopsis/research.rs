//! Automatic research: when to run it, and how the three external calls are
//! composed into one payload.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::SynopsisConfig;
use crate::error::ResearchError;

use super::model::{Profile, SessionFlags, SynopsisField};
use super::prompts::{ANALYSIS_UNAVAILABLE, SUGGESTIONS_UNAVAILABLE};

/// Longest query sent to the search sources, in characters.
pub const MAX_QUERY_CHARS: usize = 256;

/// One ranked search result. Opaque beyond its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchItem {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ResearchItem {
    pub fn new(label: impl Into<String>, url: Option<String>) -> Self {
        Self {
            label: label.into(),
            url,
        }
    }
}

/// How one external call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Completed,
    Failed,
    TimedOut,
}

/// Per-call status of a research run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchStatus {
    pub repositories: CallStatus,
    pub papers: CallStatus,
    pub analysis: CallStatus,
}

/// Everything one automatic research run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchPayload {
    pub query: String,
    pub repositories: Vec<ResearchItem>,
    pub papers: Vec<ResearchItem>,
    pub analysis: String,
    pub status: ResearchStatus,
}

/// A ranked search backend (repositories, papers).
#[async_trait]
pub trait SearchSource: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ResearchItem>, ResearchError>;
}

/// Writes free text about a project idea.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Professional analysis of the idea in light of related work.
    async fn synthesize(&self, title: &str, items: &[ResearchItem]) -> Result<String, ResearchError>;

    /// Improvement suggestions for the project as described so far.
    async fn suggest(&self, profile: &Profile) -> Result<String, ResearchError>;
}

/// Policy deciding when automatic research fires.
#[derive(Debug, Clone)]
pub struct ResearchTrigger {
    seed_fields: Vec<SynopsisField>,
    min_sections: usize,
}

impl ResearchTrigger {
    pub fn new(seed_fields: Vec<SynopsisField>, min_sections: usize) -> Self {
        Self {
            seed_fields,
            min_sections,
        }
    }

    pub fn from_config(config: &SynopsisConfig) -> Self {
        Self::new(config.research_seed_fields.clone(), config.research_min_sections)
    }

    /// Fires at most once per session: never after `auto_research_done`.
    pub fn should_trigger(&self, profile: &Profile, flags: &SessionFlags) -> bool {
        if flags.auto_research_done {
            return false;
        }
        self.seed_fields.iter().any(|f| profile.is_filled(*f))
            || profile.filled_count() >= self.min_sections
    }
}

/// Search query for a profile: the title, else the first filled field.
pub fn build_query(profile: &Profile) -> Option<String> {
    let text = profile
        .get(SynopsisField::Title)
        .or_else(|| profile.iter().next().map(|(_, v)| v))?;
    Some(text.chars().take(MAX_QUERY_CHARS).collect())
}

/// Runs searches and synthesis, each under its own timeout.
pub struct ResearchOrchestrator {
    repositories: Arc<dyn SearchSource>,
    papers: Arc<dyn SearchSource>,
    synthesizer: Arc<dyn Synthesizer>,
    repo_limit: usize,
    paper_limit: usize,
    search_timeout: Duration,
    synthesis_timeout: Duration,
}

impl ResearchOrchestrator {
    pub fn new(
        repositories: Arc<dyn SearchSource>,
        papers: Arc<dyn SearchSource>,
        synthesizer: Arc<dyn Synthesizer>,
        config: &SynopsisConfig,
    ) -> Self {
        Self {
            repositories,
            papers,
            synthesizer,
            repo_limit: config.repo_limit,
            paper_limit: config.paper_limit,
            search_timeout: config.research_timeout,
            synthesis_timeout: config.synthesis_timeout,
        }
    }

    /// Run a full research pass for `profile`.
    ///
    /// Returns `None` only when the profile has nothing to search for. A
    /// failed or slow call contributes an empty result and its status; the
    /// others still run.
    pub async fn run(&self, profile: &Profile) -> Option<ResearchPayload> {
        let query = build_query(profile)?;
        let title = profile.get(SynopsisField::Title).unwrap_or(query.as_str()).to_string();

        info!(query = %query, "Running automatic research");

        let (repos, papers) = tokio::join!(
            bounded(
                self.repositories.name(),
                self.search_timeout,
                self.repositories.search(&query, self.repo_limit)
            ),
            bounded(
                self.papers.name(),
                self.search_timeout,
                self.papers.search(&query, self.paper_limit)
            ),
        );
        let (repositories, repo_status) = (repos.0.unwrap_or_default(), repos.1);
        let (papers, paper_status) = (papers.0.unwrap_or_default(), papers.1);

        let items: Vec<ResearchItem> = repositories.iter().chain(papers.iter()).cloned().collect();
        let (analysis, analysis_status) = bounded(
            "synthesis",
            self.synthesis_timeout,
            self.synthesizer.synthesize(&title, &items),
        )
        .await;

        info!(
            repositories = repositories.len(),
            papers = papers.len(),
            analysis = ?analysis_status,
            "Automatic research finished"
        );

        Some(ResearchPayload {
            query,
            repositories,
            papers,
            analysis: analysis.unwrap_or_else(|| ANALYSIS_UNAVAILABLE.to_string()),
            status: ResearchStatus {
                repositories: repo_status,
                papers: paper_status,
                analysis: analysis_status,
            },
        })
    }

    /// Manual repository search. Failures yield an empty list.
    pub async fn search_repositories(&self, query: &str, limit: usize) -> Vec<ResearchItem> {
        bounded(self.repositories.name(), self.search_timeout, self.repositories.search(query, limit))
            .await
            .0
            .unwrap_or_default()
    }

    /// Manual paper search. Failures yield an empty list.
    pub async fn search_papers(&self, query: &str, limit: usize) -> Vec<ResearchItem> {
        bounded(self.papers.name(), self.search_timeout, self.papers.search(query, limit))
            .await
            .0
            .unwrap_or_default()
    }

    /// Manual analysis. Failures yield the fixed unavailable text.
    pub async fn analyze(&self, title: &str, items: &[ResearchItem]) -> String {
        bounded("synthesis", self.synthesis_timeout, self.synthesizer.synthesize(title, items))
            .await
            .0
            .unwrap_or_else(|| ANALYSIS_UNAVAILABLE.to_string())
    }

    /// Manual improvement suggestions. Failures yield the fixed unavailable text.
    pub async fn suggest(&self, profile: &Profile) -> String {
        bounded("suggestions", self.synthesis_timeout, self.synthesizer.suggest(profile))
            .await
            .0
            .unwrap_or_else(|| SUGGESTIONS_UNAVAILABLE.to_string())
    }
}

/// Await `call` under `limit`, logging and classifying failures.
async fn bounded<T, F>(name: &str, limit: Duration, call: F) -> (Option<T>, CallStatus)
where
    F: Future<Output = Result<T, ResearchError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => (Some(value), CallStatus::Completed),
        Ok(Err(e)) => {
            warn!(source = name, error = %e, "Research call failed");
            (None, CallStatus::Failed)
        }
        Err(_) => {
            warn!(source = name, timeout = ?limit, "Research call timed out");
            (None, CallStatus::TimedOut)
        }
    }
}
