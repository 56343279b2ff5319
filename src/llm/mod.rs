//! LLM integration for Synopsis Assist.
//!
//! Uses rig-core for HTTP transport against any OpenAI-compatible chat
//! completions endpoint (OpenRouter by default). `RigAdapter` bridges rig's
//! `CompletionModel` trait to our `LlmProvider` trait.

pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::{ExposeSecret, SecretString};

use crate::error::LlmError;

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
}

/// Create an LLM provider from configuration.
///
/// Without an API key the returned provider fails every call, which the
/// conversation path turns into its fixed fallback response.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.api_key {
        Some(ref key) => create_openai_compatible_provider(config, key),
        None => {
            tracing::warn!("No LLM API key configured; extraction will use fallback responses");
            Ok(Arc::new(UnconfiguredProvider::new("OPENROUTER_API_KEY not set")))
        }
    }
}

fn create_openai_compatible_provider(
    config: &LlmConfig,
    api_key: &SecretString,
) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::openai;

    let client: openai::CompletionsClient = openai::CompletionsClient::builder()
        .api_key(api_key.expose_secret())
        .base_url(&config.base_url)
        .build()
        .map_err(|e| LlmError::RequestFailed {
            provider: "openai-compatible".to_string(),
            reason: format!("Failed to create client: {}", e),
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using {} (model: {})", config.base_url, config.model);
    Ok(Arc::new(RigAdapter::new(model, &config.model)))
}
