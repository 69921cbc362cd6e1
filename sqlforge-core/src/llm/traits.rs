//! Traits for generative backend implementations
//!
//! The synthesis pipeline only ever talks to an `LLMProvider`; which service
//! sits behind it is decided when the provider is constructed.

use super::types::*;
use crate::llm::errors::{LLMError, LLMResult};
use async_trait::async_trait;

/// Core trait for generative backends
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Get the name of this provider
    fn name(&self) -> &str;

    /// Get the model ID being used
    fn model(&self) -> &str;

    /// Check if the provider is configured well enough to be called
    async fn is_available(&self) -> bool;

    /// Complete a chat conversation
    async fn complete(
        &self,
        messages: Vec<Message>,
        sampling: &SamplingConfig,
    ) -> LLMResult<CompletionResponse>;

    /// Single-prompt text completion.
    ///
    /// A response that stopped at the token budget, was filtered, or carries
    /// no text is an error: a cut-off script is never handed back as if it
    /// were complete.
    async fn generate(&self, prompt: &str, sampling: &SamplingConfig) -> LLMResult<String> {
        let response = self.complete(vec![Message::user(prompt)], sampling).await?;

        match response.finish_reason() {
            Some(FinishReason::Length) => {
                return Err(LLMError::OutputTruncated { limit: sampling.max_output_tokens });
            }
            Some(FinishReason::ContentFilter) => {
                return Err(LLMError::ContentFiltered {
                    reason: format!("{} filtered the response", self.name()),
                });
            }
            _ => {}
        }

        match response.text() {
            Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
            _ => Err(LLMError::empty(self.name())),
        }
    }
}
