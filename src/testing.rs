//! Deterministic stand-ins for the network-backed ports.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::{
    ports::{EmbeddingService, LlmService, Retriever},
    DomainError, Embedding, SearchResult,
};

/// Bag-of-words embedding: each lower-cased word bumps one hashed dimension.
pub struct KeywordEmbedding {
    dimension: usize,
}

impl Default for KeywordEmbedding {
    fn default() -> Self {
        Self { dimension: 256 }
    }
}

impl KeywordEmbedding {
    fn vector(&self, text: &str) -> Embedding {
        let mut vec = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
                    (h ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
                });
            vec[(hash % self.dimension as u64) as usize] += 1.0;
        }
        Embedding::new(vec)
    }
}

#[async_trait]
impl EmbeddingService for KeywordEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        Ok(self.vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        "keyword-test"
    }
}

/// Returns a canned reply and records every prompt it receives.
pub struct ScriptedLlm {
    reply: Result<String, String>,
    delay: Option<Duration>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: impl Into<String>) -> Self {
        Self {
            reply: Err(error.into()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Sleeps before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok()?.last().cloned()
    }
}

#[async_trait]
impl LlmService for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> Result<String, DomainError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map_err(DomainError::external)
    }
}

/// Retriever with a fixed outcome.
pub struct StaticRetriever(pub Result<Vec<SearchResult>, String>);

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(
        &self,
        _query: &str,
        n_results: usize,
    ) -> Result<Vec<SearchResult>, DomainError> {
        match &self.0 {
            Ok(results) => Ok(results.iter().take(n_results).cloned().collect()),
            Err(e) => Err(DomainError::external(e.clone())),
        }
    }
}
