use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::openai;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::application::{services::FALLBACK_REPLY, RagService};
use crate::domain::{
    ports::{Answer, Assistant},
    trimmed_history, DomainError, Message, MAX_HISTORY_MESSAGES,
};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::tools::{DocumentContextTool, ListDocumentsTool, SearchDocumentsTool};

/// Tool-calling agent: the model decides when to search, list or read context.
pub struct ChatAgent {
    client: openai::Client,
    model: String,
    system_prompt: String,
    temperature: f64,
    rag: Arc<RagService>,
    max_turns: usize,
    timeout: Duration,
}

impl ChatAgent {
    pub fn new(rag: Arc<RagService>, config: &AppConfig) -> Self {
        Self {
            client: openai::Client::from_env(),
            model: config.settings.openai_model.clone(),
            system_prompt: config.prompts.react_system.clone(),
            temperature: config.settings.temperature,
            rag,
            max_turns: config.settings.max_iterations,
            timeout: config.settings.llm_timeout,
        }
    }

    #[instrument(skip(self, history), fields(model = %self.model, history = history.len()))]
    pub async fn chat_with_history(
        &self,
        message: &str,
        history: &[Message],
    ) -> Result<String, DomainError> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(&self.system_prompt)
            .temperature(self.temperature)
            .tool(SearchDocumentsTool::new(self.rag.clone()))
            .tool(DocumentContextTool::new(self.rag.clone()))
            .tool(ListDocumentsTool::new(self.rag.clone()))
            .build();

        let prompt = build_prompt(message, history);

        tokio::time::timeout(self.timeout, agent.prompt(&prompt).multi_turn(self.max_turns))
            .await
            .map_err(|_| DomainError::timeout("Agent execution timed out"))?
            .map_err(|e| DomainError::external(format!("Agent failed: {e}")))
    }
}

fn build_prompt(message: &str, history: &[Message]) -> String {
    let history = trimmed_history(history, MAX_HISTORY_MESSAGES);
    if history.is_empty() {
        return message.to_string();
    }

    let context = history
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!("Previous conversation:\n{context}\n\nCurrent message from user: {message}")
}

#[async_trait]
impl Assistant for ChatAgent {
    async fn answer(&self, question: &str, history: &[Message]) -> Result<Answer, DomainError> {
        let reply = self.chat_with_history(question, history).await?;
        if reply.trim().is_empty() {
            return Ok(Answer::text(FALLBACK_REPLY));
        }
        Ok(Answer::text(reply))
    }
}
