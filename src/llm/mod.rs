//! LLM provider abstraction layer.
//!
//! Used for frame captioning (vision models) and for answering chat
//! questions about analyzed videos.

mod ollama;
mod openai;
mod provider;
mod types;

pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
pub use provider::{CompletionOptions, LlmError, LlmProvider};
pub use types::{CompletionResponse, FinishReason, Message, MessageRole, TokenUsage};

use crate::config::{LlmProviderKind, LlmProviderSettings};
use std::sync::Arc;

/// Build a provider from its resolved configuration.
pub fn build_provider(settings: &LlmProviderSettings) -> Arc<dyn LlmProvider> {
    match settings.kind {
        LlmProviderKind::OpenAI => Arc::new(OpenAIProvider::new(
            settings.base_url.clone(),
            settings.model.clone(),
            settings.api_key.clone(),
        )),
        LlmProviderKind::Ollama => Arc::new(OllamaProvider::new(
            settings.base_url.clone(),
            settings.model.clone(),
        )),
    }
}
