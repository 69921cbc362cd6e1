//! Mock provider for testing
//!
//! Replays queued responses or errors in order and records every request.
//! Only compiled for unit tests.

#![cfg(test)]

use super::errors::{LLMError, LLMResult};
use super::traits::LLMProvider;
use super::types::*;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Mock LLM provider for testing
#[derive(Clone, Default)]
pub struct MockLLMProvider {
    queue: Arc<Mutex<VecDeque<LLMResult<CompletionResponse>>>>,
    call_history: Arc<Mutex<Vec<(Vec<Message>, SamplingConfig)>>>,
}

impl MockLLMProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that replies with `texts`, one per call, in order
    pub fn replying(texts: &[&str]) -> Self {
        let provider = Self::new();
        for text in texts {
            provider.push_text(text);
        }
        provider
    }

    pub fn push_text(&self, text: &str) {
        self.push_response(Self::simple_response(text, FinishReason::Stop));
    }

    pub fn push_response(&self, response: CompletionResponse) {
        self.queue.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_error(&self, error: LLMError) {
        self.queue.lock().unwrap().push_back(Err(error));
    }

    /// Prompts received so far, first user message of each call
    pub fn prompts(&self) -> Vec<String> {
        self.call_history
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(messages, _)| messages.first().map(|m| m.content.clone()))
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.call_history.lock().unwrap().len()
    }

    pub fn last_sampling(&self) -> Option<SamplingConfig> {
        self.call_history.lock().unwrap().last().map(|(_, s)| *s)
    }

    pub fn simple_response(content: &str, finish_reason: FinishReason) -> CompletionResponse {
        CompletionResponse {
            id: "mock-response".to_string(),
            model: "mock-model".to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(content),
                finish_reason: Some(finish_reason),
            }],
            usage: Some(Usage { prompt_tokens: 10, completion_tokens: 20, total_tokens: 30 }),
        }
    }
}

#[async_trait]
impl LLMProvider for MockLLMProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn complete(
        &self,
        messages: Vec<Message>,
        sampling: &SamplingConfig,
    ) -> LLMResult<CompletionResponse> {
        self.call_history.lock().unwrap().push((messages, *sampling));

        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LLMError::empty("mock")))
    }
}
