//! GitHub repository search.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::error::ResearchError;
use crate::synopsis::research::{ResearchItem, SearchSource};

use super::{USER_AGENT, truncate_words};

const SOURCE: &str = "github";
const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Repositories below this star count are filtered out by the query.
const MIN_STARS: u32 = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    full_name: String,
    html_url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    language: Option<String>,
}

impl Repository {
    fn into_item(self) -> ResearchItem {
        let mut label = format!("{} ({} stars", self.full_name, self.stargazers_count);
        if let Some(lang) = self.language.filter(|l| !l.is_empty()) {
            label.push_str(", ");
            label.push_str(&lang);
        }
        label.push(')');
        if let Some(desc) = self.description.filter(|d| !d.trim().is_empty()) {
            label.push_str(": ");
            label.push_str(&truncate_words(&desc, 15));
        }
        ResearchItem::new(label, Some(self.html_url))
    }
}

/// Searches public repositories, most-starred first.
pub struct GitHubRepoSource {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl GitHubRepoSource {
    pub fn new(token: Option<SecretString>) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            token,
        }
    }

    /// Point at a different API host (GitHub Enterprise, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl SearchSource for GitHubRepoSource {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ResearchItem>, ResearchError> {
        let url = format!("{}/search/repositories", self.base_url);
        let q = format!("{query} stars:>{MIN_STARS}");
        let per_page = limit.to_string();

        let mut request = self
            .client
            .get(&url)
            .query(&[
                ("q", q.as_str()),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
            ])
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token.expose_secret()));
        }

        let response = request.send().await.map_err(|e| ResearchError::RequestFailed {
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

        debug!(query = %query, results = body.items.len(), "GitHub search complete");
        Ok(body
            .items
            .into_iter()
            .take(limit)
            .map(Repository::into_item)
            .collect())
    }
}
