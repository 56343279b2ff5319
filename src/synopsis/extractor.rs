//! ConversationExtractor: asks the language model for field updates and
//! merges them into the profile.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

use super::model::{DialogueTurn, Profile, SynopsisField};
use super::prompts::{
    EMPTY_REPLY_RESPONSE, EXTRACTION_FAILED_RESPONSE, extraction_prompt, extraction_system_prompt,
    parse_extractor_reply,
};

/// Result of one extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub profile: Profile,
    /// Fields whose value strictly changed, in canonical order.
    pub updated_fields: Vec<SynopsisField>,
    pub response: String,
    /// The collaborator call failed and nothing was applied.
    pub failed: bool,
}

impl Extraction {
    fn failed(profile: &Profile) -> Self {
        Self {
            profile: profile.clone(),
            updated_fields: Vec::new(),
            response: EXTRACTION_FAILED_RESPONSE.to_string(),
            failed: true,
        }
    }
}

/// Turn a proposed JSON value into field text.
///
/// Strings are taken as-is, arrays of strings are joined one per line.
/// Anything else is rejected.
fn proposed_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Merge proposed values into a copy of `profile`.
///
/// Unmentioned fields carry over, blank or mistyped proposals are dropped,
/// and a field is reported only if its value strictly changed. Applying the
/// same delta twice yields the same profile.
pub fn merge_delta(profile: &Profile, delta: &Map<String, Value>) -> (Profile, Vec<SynopsisField>) {
    let mut merged = profile.clone();
    let mut updated = Vec::new();

    for field in SynopsisField::ALL {
        let Some(text) = delta.get(field.key()).and_then(proposed_text) else {
            continue;
        };
        if merged.set(field, &text) {
            updated.push(field);
        }
    }

    let ignored: Vec<&str> = delta
        .keys()
        .filter(|k| SynopsisField::from_key(k).is_none())
        .map(String::as_str)
        .collect();
    if !ignored.is_empty() {
        debug!(keys = ?ignored, "Ignoring non-canonical keys in extractor output");
    }

    (merged, updated)
}

/// Wraps the language-understanding collaborator.
pub struct ConversationExtractor {
    llm: Arc<dyn LlmProvider>,
    timeout: Duration,
    history_window: usize,
}

impl ConversationExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>, timeout: Duration, history_window: usize) -> Self {
        Self {
            llm,
            timeout,
            history_window,
        }
    }

    /// Extract field updates from one utterance.
    ///
    /// Never fails: a collaborator error yields the unchanged profile, no
    /// updated fields and the fixed apology.
    pub async fn extract(&self, utterance: &str, history: &[DialogueTurn], profile: &Profile) -> Extraction {
        let window_start = history.len().saturating_sub(self.history_window);
        let prompt = extraction_prompt(profile, &history[window_start..], utterance);

        let request = CompletionRequest::new(vec![
            ChatMessage::system(extraction_system_prompt()),
            ChatMessage::user(prompt),
        ])
        .with_temperature(0.2)
        .with_max_tokens(2048);

        let raw = match self.call(request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(model = self.llm.model_name(), error = %e, "Extraction call failed");
                return Extraction::failed(profile);
            }
        };

        let reply = match parse_extractor_reply(&raw) {
            Ok(reply) => reply,
            Err(e) => {
                let preview: String = raw.chars().take(300).collect();
                warn!(error = %e, raw = %preview, "Failed to parse extraction JSON");
                return Extraction::failed(profile);
            }
        };

        let (merged, updated_fields) = match reply.updated_memory {
            Some(ref delta) => merge_delta(profile, delta),
            None => {
                warn!("Extractor reply had no usable updated_memory object");
                (profile.clone(), Vec::new())
            }
        };

        if !updated_fields.is_empty() {
            info!(fields = ?updated_fields, "Updated synopsis fields");
        }

        Extraction {
            profile: merged,
            updated_fields,
            response: reply.response.unwrap_or_else(|| EMPTY_REPLY_RESPONSE.to_string()),
            failed: false,
        }
    }

    async fn call(&self, request: CompletionRequest) -> Result<String, LlmError> {
        match tokio::time::timeout(self.timeout, self.llm.complete(request)).await {
            Ok(result) => result.map(|r| {
                debug!(
                    input_tokens = r.input_tokens,
                    output_tokens = r.output_tokens,
                    "Extraction call complete"
                );
                r.content
            }),
            Err(_) => Err(LlmError::Timeout(self.timeout)),
        }
    }
}
