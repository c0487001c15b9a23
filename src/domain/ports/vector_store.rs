use crate::domain::{
    errors::DomainError, DocumentChunk, DocumentSummary, Embedding, SearchFilter, SearchResult,
};
use async_trait::async_trait;

/// Persistent collection of embedded chunks.
///
/// Chunks are keyed by id; adding a chunk whose id already exists replaces it.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[Embedding],
    ) -> Result<(), DomainError>;

    /// Nearest chunks first.
    async fn search(
        &self,
        query: &Embedding,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>, DomainError>;

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<DocumentChunk>, DomainError>;

    /// Removes the chunks of `document_id` whose id is not in `keep`.
    /// Returns the number of chunks removed.
    async fn prune_document(
        &self,
        document_id: &str,
        keep: &[String],
    ) -> Result<usize, DomainError>;

    /// Returns the number of chunks removed.
    async fn delete_by_document(&self, document_id: &str) -> Result<usize, DomainError> {
        self.prune_document(document_id, &[]).await
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, DomainError>;

    async fn count(&self) -> Result<usize, DomainError>;

    /// Removes every chunk and returns how many were removed.
    async fn clear(&self) -> Result<usize, DomainError>;
}
