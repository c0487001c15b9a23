use crate::domain::errors::DomainError;
use async_trait::async_trait;

/// Single-shot text completion against a hosted chat model.
#[async_trait]
pub trait LlmService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, DomainError>;
}
