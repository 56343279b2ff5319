//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

use crate::synopsis::model::SynopsisField;

/// Thresholds and limits that drive the synopsis workflow.
#[derive(Debug, Clone)]
pub struct SynopsisConfig {
    /// A value must be longer than this many characters to count as substantive.
    pub substantive_min_chars: usize,
    /// Filled sections required before document generation unlocks.
    pub unlock_threshold: usize,
    /// Substantive sections required before the one-time ready notice fires.
    pub notice_threshold: usize,
    /// Fields whose presence is enough to start automatic research.
    pub research_seed_fields: Vec<SynopsisField>,
    /// Filled sections that start automatic research even without a seed field.
    pub research_min_sections: usize,
    /// Number of trailing history turns shown to the extractor.
    pub history_window: usize,
    /// Max repositories requested per research run.
    pub repo_limit: usize,
    /// Max papers requested per research run.
    pub paper_limit: usize,
    /// Timeout for the extraction call.
    pub extract_timeout: Duration,
    /// Timeout for each search call.
    pub research_timeout: Duration,
    /// Timeout for the synthesis call.
    pub synthesis_timeout: Duration,
}

impl Default for SynopsisConfig {
    fn default() -> Self {
        Self {
            substantive_min_chars: 10,
            unlock_threshold: 3,
            notice_threshold: 4,
            research_seed_fields: vec![SynopsisField::Title],
            research_min_sections: 3,
            history_window: 3,
            repo_limit: 5,
            paper_limit: 5,
            extract_timeout: Duration::from_secs(60),
            research_timeout: Duration::from_secs(10),
            synthesis_timeout: Duration::from_secs(45),
        }
    }
}

impl SynopsisConfig {
    /// Build from `SYNOPSIS_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            substantive_min_chars: env_or("SYNOPSIS_SUBSTANTIVE_MIN_CHARS", defaults.substantive_min_chars),
            unlock_threshold: env_or("SYNOPSIS_UNLOCK_THRESHOLD", defaults.unlock_threshold),
            notice_threshold: env_or("SYNOPSIS_NOTICE_THRESHOLD", defaults.notice_threshold),
            research_seed_fields: defaults.research_seed_fields,
            research_min_sections: env_or("SYNOPSIS_RESEARCH_MIN_SECTIONS", defaults.research_min_sections),
            history_window: env_or("SYNOPSIS_HISTORY_WINDOW", defaults.history_window),
            repo_limit: env_or("SYNOPSIS_REPO_LIMIT", defaults.repo_limit),
            paper_limit: env_or("SYNOPSIS_PAPER_LIMIT", defaults.paper_limit),
            extract_timeout: Duration::from_secs(env_or("SYNOPSIS_EXTRACT_TIMEOUT_SECS", 60)),
            research_timeout: Duration::from_secs(env_or("SYNOPSIS_RESEARCH_TIMEOUT_SECS", 10)),
            synthesis_timeout: Duration::from_secs(env_or("SYNOPSIS_SYNTHESIS_TIMEOUT_SECS", 45)),
        }
    }
}

/// Which session store backs the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    LibSql { path: PathBuf },
    Memory,
}

impl StoreBackend {
    /// Resolve `SYNOPSIS_STORE` (`libsql` by default, or `memory`).
    pub fn parse(kind: Option<&str>, db_path: Option<String>) -> Result<Self, ConfigError> {
        match kind.map(str::trim).unwrap_or("libsql") {
            "" | "libsql" => Ok(Self::LibSql {
                path: PathBuf::from(db_path.unwrap_or_else(|| "./data/synopsis.db".to_string())),
            }),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                key: "SYNOPSIS_STORE".to_string(),
                message: format!("expected `libsql` or `memory`, got `{other}`"),
            }),
        }
    }
}

/// Process-level settings for the HTTP server binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub store: StoreBackend,
    /// Directory generated documents are written to.
    pub output_dir: PathBuf,
    pub llm_base_url: String,
    pub model: String,
    /// Key for the chat completions endpoint. Unset means degraded replies.
    pub llm_api_key: Option<SecretString>,
    /// Optional token for authenticated (higher-limit) GitHub search.
    pub github_token: Option<SecretString>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let store = StoreBackend::parse(
            std::env::var("SYNOPSIS_STORE").ok().as_deref(),
            std::env::var("SYNOPSIS_DB_PATH").ok(),
        )?;

        Ok(Self {
            port: env_or("SYNOPSIS_PORT", 5000),
            store,
            output_dir: std::env::var("SYNOPSIS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./outputs")),
            llm_base_url: std::env::var("SYNOPSIS_LLM_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
            model: std::env::var("SYNOPSIS_MODEL")
                .unwrap_or_else(|_| "nvidia/nemotron-nano-12b-v2-vl:free".to_string()),
            llm_api_key: secret_env("OPENROUTER_API_KEY"),
            github_token: secret_env("GITHUB_TOKEN"),
        })
    }
}

fn secret_env(key: &str) -> Option<SecretString> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

/// Parse an env var, falling back to `default` when unset or unparseable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_workflow_thresholds() {
        let c = SynopsisConfig::default();
        assert_eq!(c.substantive_min_chars, 10);
        assert_eq!(c.unlock_threshold, 3);
        assert_eq!(c.notice_threshold, 4);
        assert_eq!(c.research_seed_fields, vec![SynopsisField::Title]);
        assert_eq!(c.history_window, 3);
    }

    #[test]
    fn store_backend_parsing() {
        assert_eq!(
            StoreBackend::parse(None, None).unwrap(),
            StoreBackend::LibSql {
                path: PathBuf::from("./data/synopsis.db")
            }
        );
        assert_eq!(
            StoreBackend::parse(Some("libsql"), Some("/tmp/s.db".into())).unwrap(),
            StoreBackend::LibSql {
                path: PathBuf::from("/tmp/s.db")
            }
        );
        assert_eq!(StoreBackend::parse(Some("memory"), None).unwrap(), StoreBackend::Memory);
        assert!(matches!(
            StoreBackend::parse(Some("postgres"), None),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn env_or_falls_back_on_garbage() {
        // SAFETY: This test runs in isolation; no other thread reads this variable.
        unsafe { std::env::set_var("SYNOPSIS_TEST_GARBAGE", "not-a-number") };
        assert_eq!(env_or("SYNOPSIS_TEST_GARBAGE", 7usize), 7);
        unsafe { std::env::set_var("SYNOPSIS_TEST_GARBAGE", " 12 ") };
        assert_eq!(env_or("SYNOPSIS_TEST_GARBAGE", 7usize), 12);
        unsafe { std::env::remove_var("SYNOPSIS_TEST_GARBAGE") };
        assert_eq!(env_or("SYNOPSIS_TEST_GARBAGE", 7usize), 7);
    }
}
