//! Synopsis document assembly and rendering.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::DocumentError;

use super::model::{Profile, SynopsisField};
use super::research::{CallStatus, ResearchItem, ResearchPayload};

const UNTITLED: &str = "Project Title";
const NO_TEAM: &str = "Team Details";

/// A titled section of the document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSection {
    pub heading: &'static str,
    pub body: String,
}

/// Section content sources, tried in order; the placeholder fills the gap.
enum Source {
    Field(SynopsisField),
    Analysis,
    Papers,
    Repositories,
}

const LAYOUT: &[(&str, &[Source], &str)] = &[
    (
        "Introduction",
        &[Source::Field(SynopsisField::ObjectiveScope)],
        "Project introduction will be detailed here.",
    ),
    (
        "Literature Review",
        &[Source::Analysis, Source::Papers],
        "Comprehensive literature review of related work in the domain.",
    ),
    (
        "Problem Statement",
        &[Source::Field(SynopsisField::ObjectiveScope)],
        "The problem statement will outline the key challenges addressed by this project.",
    ),
    (
        "Objectives and Scope",
        &[Source::Field(SynopsisField::ObjectiveScope)],
        "Project objectives and scope will be defined here.",
    ),
    (
        "Methodology",
        &[Source::Field(SynopsisField::ProcessDescription)],
        "Detailed methodology and technical approach.",
    ),
    (
        "Resources and Limitations",
        &[Source::Field(SynopsisField::ResourcesLimitations)],
        "Required resources and known limitations of the project.",
    ),
    (
        "Implementation Plan",
        &[Source::Field(SynopsisField::ProcessDescription)],
        "Detailed implementation plan with timeline and milestones.",
    ),
    (
        "Expected Outcomes",
        &[Source::Field(SynopsisField::Conclusion)],
        "Expected outcomes and impact of the project.",
    ),
    (
        "Related Projects",
        &[Source::Repositories],
        "No related open-source projects were identified.",
    ),
    (
        "References",
        &[Source::Field(SynopsisField::References), Source::Papers],
        "References will be added based on research conducted.",
    ),
];

/// Everything needed to render one synopsis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynopsisDocument {
    pub title: String,
    pub submitted_by: String,
    pub sections: Vec<DocumentSection>,
}

impl SynopsisDocument {
    /// Build the document from the profile and the stored research, if any.
    pub fn assemble(profile: &Profile, research: Option<&ResearchPayload>) -> Self {
        let sections = LAYOUT
            .iter()
            .map(|&(heading, sources, placeholder)| DocumentSection {
                heading,
                body: sources
                    .iter()
                    .find_map(|s| resolve(s, profile, research))
                    .unwrap_or_else(|| placeholder.to_string()),
            })
            .collect();

        Self {
            title: profile.get(SynopsisField::Title).unwrap_or(UNTITLED).to_string(),
            submitted_by: profile
                .get(SynopsisField::GroupDetails)
                .unwrap_or(NO_TEAM)
                .to_string(),
            sections,
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", self.title);
        let _ = writeln!(out, "**PROJECT SYNOPSIS**\n");
        let _ = writeln!(out, "**Submitted by:** {}\n", self.submitted_by);
        let _ = writeln!(out, "## Table of Contents\n");
        for (i, section) in self.sections.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, section.heading);
        }
        for (i, section) in self.sections.iter().enumerate() {
            let _ = writeln!(out, "\n## {}. {}\n", i + 1, section.heading);
            let _ = writeln!(out, "{}", section.body);
        }
        out
    }
}

fn resolve(source: &Source, profile: &Profile, research: Option<&ResearchPayload>) -> Option<String> {
    match source {
        Source::Field(field) => profile.get(*field).map(str::to_string),
        Source::Analysis => research
            .filter(|r| r.status.analysis == CallStatus::Completed)
            .map(|r| r.analysis.clone()),
        Source::Papers => research.and_then(|r| bullet_list(&r.papers)),
        Source::Repositories => research.and_then(|r| bullet_list(&r.repositories)),
    }
}

fn bullet_list(items: &[ResearchItem]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let lines: Vec<String> = items
        .iter()
        .map(|item| match &item.url {
            Some(url) => format!("- {} ({url})", item.label),
            None => format!("- {}", item.label),
        })
        .collect();
    Some(lines.join("\n"))
}

/// Where a rendered document ended up.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DocumentRef {
    pub filename: String,
    #[serde(skip)]
    pub path: PathBuf,
}

/// Turns an assembled document into a downloadable artifact.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, session_id: &str, document: &SynopsisDocument) -> Result<DocumentRef, DocumentError>;

    /// Look up a previously rendered file by name.
    fn locate(&self, filename: &str) -> Result<PathBuf, DocumentError>;
}

/// Writes Markdown files into a single output directory.
pub struct MarkdownRenderer {
    output_dir: PathBuf,
}

impl MarkdownRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Only names this renderer could have produced are accepted.
fn is_document_name(name: &str) -> bool {
    name.starts_with("synopsis_")
        && name.ends_with(".md")
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[async_trait]
impl DocumentRenderer for MarkdownRenderer {
    async fn render(&self, session_id: &str, document: &SynopsisDocument) -> Result<DocumentRef, DocumentError> {
        let short: String = session_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .take(8)
            .collect();
        // Same-second renders for one session still get distinct names
        let nonce: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let filename = format!(
            "synopsis_{}_{short}_{nonce}.md",
            Utc::now().format("%Y%m%d_%H%M%S")
        );

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(&filename);
        tokio::fs::write(&path, document.to_markdown()).await?;

        info!(session_id = %session_id, file = %filename, "Synopsis document written");
        Ok(DocumentRef { filename, path })
    }

    fn locate(&self, filename: &str) -> Result<PathBuf, DocumentError> {
        if !is_document_name(filename) {
            return Err(DocumentError::InvalidName(filename.to_string()));
        }
        let path = self.output_dir.join(filename);
        if path.is_file() {
            Ok(path)
        } else {
            Err(DocumentError::NotFound(filename.to_string()))
        }
    }
}
