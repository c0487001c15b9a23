use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

use crate::application::services::RetrievalService;
use crate::domain::{
    ports::{Answer, Assistant, LlmService, SourceRef},
    trimmed_history, DomainError, Message, MessageRole, MAX_HISTORY_MESSAGES,
};
use crate::infrastructure::PromptsConfig;

pub const FALLBACK_REPLY: &str = "I apologize, but I couldn't generate a response.";

/// Assistant messages carried into the final prompt.
const HISTORY_IN_PROMPT: usize = 3;

/// Retrieve-then-answer: one retrieval pass, one completion.
pub struct ChatService {
    retrieval: Arc<RetrievalService>,
    llm: Arc<dyn LlmService>,
    prompts: PromptsConfig,
}

impl ChatService {
    pub fn new(
        retrieval: Arc<RetrievalService>,
        llm: Arc<dyn LlmService>,
        prompts: PromptsConfig,
    ) -> Self {
        Self {
            retrieval,
            llm,
            prompts,
        }
    }

    fn history_text(history: &[Message]) -> String {
        let lines: Vec<String> = history
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .map(|m| format!("Assistant: {}", m.content))
            .collect();

        if lines.is_empty() {
            return "None".to_string();
        }
        lines[lines.len().saturating_sub(HISTORY_IN_PROMPT)..].join("\n")
    }
}

#[async_trait]
impl Assistant for ChatService {
    #[instrument(skip(self, history), fields(history = history.len()))]
    async fn answer(&self, question: &str, history: &[Message]) -> Result<Answer, DomainError> {
        let history = trimmed_history(history, MAX_HISTORY_MESSAGES);

        let results = self.retrieval.retrieve(question, true, None).await?;
        let context = RetrievalService::context_text(&results);
        tracing::info!(chunks = results.len(), "retrieved context");

        let prompt =
            self.prompts
                .final_response(&context, &Self::history_text(history), question);
        let reply = self.llm.complete(&prompt).await?;

        let content = if reply.trim().is_empty() {
            FALLBACK_REPLY.to_string()
        } else {
            reply
        };

        Ok(Answer {
            content,
            sources: results.iter().map(SourceRef::from).collect(),
        })
    }
}
