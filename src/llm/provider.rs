use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::ProviderError;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "groq", "mock")
    fn name(&self) -> &str;

    /// chat completion (non-streaming)
    ///
    /// When `request.structured` is set the provider must force the model to
    /// answer through that schema and return the raw JSON arguments it produced.
    async fn chat(&self, request: ChatRequest) -> Result<String, ProviderError>;
}
