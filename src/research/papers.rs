//! Semantic Scholar paper search.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::ResearchError;
use crate::synopsis::research::{ResearchItem, SearchSource};

use super::USER_AGENT;

const SOURCE: &str = "semantic-scholar";
const DEFAULT_BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Debug, Deserialize)]
struct Paper {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    year: Option<u32>,
    #[serde(default)]
    url: Option<String>,
}

impl Paper {
    fn into_item(self) -> Option<ResearchItem> {
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        let label = match self.year {
            Some(year) => format!("{} ({year})", title.trim()),
            None => title.trim().to_string(),
        };
        Some(ResearchItem::new(label, self.url))
    }
}

pub struct SemanticScholarSource {
    client: Client,
    base_url: String,
}

impl SemanticScholarSource {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for SemanticScholarSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchSource for SemanticScholarSource {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ResearchItem>, ResearchError> {
        let url = format!("{}/paper/search", self.base_url);
        let limit_param = limit.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("query", query),
                ("limit", limit_param.as_str()),
                ("fields", "title,year,url"),
            ])
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| ResearchError::RequestFailed {
                source_name: SOURCE.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResearchError::Status {
                source_name: SOURCE.to_string(),
                status: status.as_u16(),
            });
        }

        let body: SearchResponse = response.json().await.map_err(|e| ResearchError::InvalidResponse {
            source_name: SOURCE.to_string(),
            reason: e.to_string(),
        })?;

        let items: Vec<ResearchItem> = body
            .data
            .into_iter()
            .filter_map(Paper::into_item)
            .take(limit)
            .collect();
        debug!(query = %query, results = items.len(), "Paper search complete");
        Ok(items)
    }
}
