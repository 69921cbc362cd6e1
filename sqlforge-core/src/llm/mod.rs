//! Generative backend integration
//!
//! The synthesis pipeline treats the backend as an opaque text-completion
//! service: one prompt in, one completion out.

pub mod config;
pub mod errors;
pub mod mock;
pub mod openai_compat;
pub mod traits;
pub mod types;

pub use config::BackendConfig;
pub use errors::{LLMError, LLMResult};
pub use openai_compat::OpenAICompatProvider;
pub use traits::LLMProvider;
pub use types::{CompletionResponse, FinishReason, Message, Role, SamplingConfig, Usage};

use std::sync::Arc;

/// Build the provider described by `config`
pub fn provider_from_config(config: BackendConfig) -> LLMResult<Arc<dyn LLMProvider>> {
    Ok(Arc::new(OpenAICompatProvider::new(config)?))
}
