use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::openai;
use std::time::Duration;

use crate::domain::{ports::LlmService, DomainError};
use crate::infrastructure::config::Settings;

pub struct OpenAiLlm {
    client: openai::Client,
    model: String,
    temperature: f64,
    timeout: Duration,
}

impl OpenAiLlm {
    pub fn new(model: impl Into<String>, temperature: f64) -> Self {
        Self {
            client: openai::Client::from_env(),
            model: model.into(),
            temperature,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.openai_model.clone(), settings.temperature)
            .with_timeout(settings.llm_timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

}

#[async_trait]
impl LlmService for OpenAiLlm {
    async fn complete(&self, prompt: &str) -> Result<String, DomainError> {
        let agent = self
            .client
            .agent(&self.model)
            .temperature(self.temperature)
            .build();

        tokio::time::timeout(self.timeout, agent.prompt(prompt))
            .await
            .map_err(|_| DomainError::timeout("LLM request timed out"))?
            .map_err(|e| DomainError::external(e.to_string()))
    }
}
