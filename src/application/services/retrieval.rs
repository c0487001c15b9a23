use std::sync::Arc;
use tracing::instrument;

use crate::domain::{ports::Retriever, DomainError, SearchResult};

const NO_CONTEXT: &str = "No relevant context found.";

/// Converts a distance (smaller is closer) into a score in `(0, 1]`.
pub fn relevance_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Hybrid retrieval: an optional primary retriever (the tool server) with the
/// local vector search as fallback, followed by relevance filtering.
pub struct RetrievalService {
    vector: Arc<dyn Retriever>,
    primary: Option<Arc<dyn Retriever>>,
    top_k: usize,
    relevance_threshold: f32,
}

impl RetrievalService {
    pub fn new(vector: Arc<dyn Retriever>, top_k: usize, relevance_threshold: f32) -> Self {
        Self {
            vector,
            primary: None,
            top_k,
            relevance_threshold,
        }
    }

    pub fn with_primary(mut self, primary: Arc<dyn Retriever>) -> Self {
        self.primary = Some(primary);
        self
    }

    #[instrument(skip(self))]
    pub async fn retrieve(
        &self,
        query: &str,
        use_primary: bool,
        n_results: Option<usize>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let n_results = n_results.filter(|n| *n > 0).unwrap_or(self.top_k);

        if let (true, Some(primary)) = (use_primary, &self.primary) {
            match primary.retrieve(query, n_results).await {
                Ok(results) if !results.is_empty() => {
                    tracing::info!(found = results.len(), "retrieved via tool server");
                    return Ok(self.filter_by_relevance(results));
                }
                Ok(_) => tracing::info!("tool server returned nothing, using vector store"),
                Err(e) => {
                    tracing::warn!(error = %e, "tool server retrieval failed, falling back to vector store")
                }
            }
        }

        tracing::info!("using direct vector store search");
        let results = self.vector.retrieve(query, n_results).await?;
        Ok(self.filter_by_relevance(results))
    }

    /// Scores every result and drops those under the threshold. A non-positive
    /// threshold keeps everything; if nothing passes, all results are kept.
    pub fn filter_by_relevance(&self, mut results: Vec<SearchResult>) -> Vec<SearchResult> {
        for result in &mut results {
            result.relevance_score = Some(relevance_from_distance(result.distance));
        }

        if self.relevance_threshold <= 0.0 || results.is_empty() {
            return results;
        }

        let threshold = self.relevance_threshold;
        let passing = results
            .iter()
            .filter(|r| r.relevance_score.unwrap_or(0.0) >= threshold)
            .count();

        if passing == 0 {
            tracing::warn!(
                total = results.len(),
                threshold,
                "all results below relevance threshold, returning them unfiltered"
            );
            return results;
        }

        results.retain(|r| {
            let keep = r.relevance_score.unwrap_or(0.0) >= threshold;
            if !keep {
                tracing::debug!(
                    relevance = r.relevance_score,
                    threshold,
                    "filtered out result"
                );
            }
            keep
        });
        tracing::info!(kept = results.len(), "results after relevance filtering");
        results
    }

    /// Renders results as prompt context, one `[Source: …, Chunk …]` block each.
    pub fn context_text(results: &[SearchResult]) -> String {
        if results.is_empty() {
            return NO_CONTEXT.to_string();
        }

        results
            .iter()
            .map(|r| {
                format!(
                    "[Source: {}, Chunk {}]\n{}\n",
                    r.chunk.metadata.source_file, r.chunk.metadata.chunk_index, r.chunk.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
