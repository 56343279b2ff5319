//! LLM-backed project analysis and improvement suggestions.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ResearchError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::synopsis::model::Profile;
use crate::synopsis::prompts::{suggestions_prompt, synthesis_prompt};
use crate::synopsis::research::{ResearchItem, Synthesizer};

pub struct LlmSynthesizer {
    llm: Arc<dyn LlmProvider>,
}

impl LlmSynthesizer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// One free-text completion. A blank answer counts as a failure.
    async fn write(&self, task: &str, prompt: String) -> Result<String, ResearchError> {
        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)])
            .with_temperature(0.7)
            .with_max_tokens(1500);

        let response = self.llm.complete(request).await?;
        debug!(
            task,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Synthesis call complete"
        );
        let text = response.content.trim();
        if text.is_empty() {
            return Err(ResearchError::InvalidResponse {
                source_name: task.to_string(),
                reason: "empty reply".to_string(),
            });
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl Synthesizer for LlmSynthesizer {
    async fn synthesize(&self, title: &str, items: &[ResearchItem]) -> Result<String, ResearchError> {
        self.write("synthesis", synthesis_prompt(title, items)).await
    }

    async fn suggest(&self, profile: &Profile) -> Result<String, ResearchError> {
        self.write("suggestions", suggestions_prompt(profile)).await
    }
}
