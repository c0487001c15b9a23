use crate::domain::{errors::DomainError, Message, SearchResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub document_id: String,
    pub source_file: String,
    pub chunk_index: usize,
    pub relevance_score: Option<f32>,
}

impl From<&SearchResult> for SourceRef {
    fn from(result: &SearchResult) -> Self {
        Self {
            document_id: result.chunk.metadata.document_id.clone(),
            source_file: result.chunk.metadata.source_file.clone(),
            chunk_index: result.chunk.metadata.chunk_index,
            relevance_score: result.relevance_score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub content: String,
    pub sources: Vec<SourceRef>,
}

impl Answer {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sources: Vec::new(),
        }
    }
}

/// Answers a question given the prior turns of a conversation.
#[async_trait]
pub trait Assistant: Send + Sync {
    async fn answer(&self, question: &str, history: &[Message]) -> Result<Answer, DomainError>;
}
