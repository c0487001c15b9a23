use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

use crate::domain::{
    ports::{EmbeddingService, Retriever, VectorStore},
    DocumentChunk, DocumentSummary, DomainError, SearchFilter, SearchResult,
};

/// Embeds chunks into the vector store and answers similarity queries against it.
pub struct RagService {
    embedding: Arc<dyn EmbeddingService>,
    vector_store: Arc<dyn VectorStore>,
    default_top_k: usize,
}

impl RagService {
    pub fn new(
        embedding: Arc<dyn EmbeddingService>,
        vector_store: Arc<dyn VectorStore>,
        default_top_k: usize,
    ) -> Self {
        Self {
            embedding,
            vector_store,
            default_top_k,
        }
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    #[instrument(skip(self))]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>, DomainError> {
        self.search(query, self.default_top_k, None).await
    }

    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let embedding = self.embedding.embed(query).await?;
        let results = self.vector_store.search(&embedding, top_k, filter).await?;
        tracing::info!(found = results.len(), "vector search finished");
        Ok(results)
    }

    /// Embeds and stores `chunks`, replacing any chunks already stored for the same documents.
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub async fn index_chunks(&self, chunks: &[DocumentChunk]) -> Result<usize, DomainError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings = self.embedding.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(DomainError::external(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        let expected = self.embedding.dimension();
        if let Some(bad) = embeddings.iter().find(|e| e.dimension() != expected) {
            return Err(DomainError::external(format!(
                "{} returned {}-dimensional vectors, expected {expected}",
                self.embedding.model(),
                bad.dimension()
            )));
        }

        // The previous version stays intact until the new chunks are stored.
        self.vector_store.add(chunks, &embeddings).await?;

        let mut documents: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for chunk in chunks {
            documents
                .entry(chunk.document_id())
                .or_default()
                .push(chunk.id.clone());
        }
        for (document_id, keep) in documents {
            let removed = self.vector_store.prune_document(document_id, &keep).await?;
            if removed > 0 {
                tracing::info!(document_id, removed, "removed stale chunks from previous version");
            }
        }

        tracing::info!(
            added = chunks.len(),
            model = self.embedding.model(),
            "added chunks to vector store"
        );
        Ok(chunks.len())
    }

    #[instrument(skip(self))]
    pub async fn delete_document(&self, document_id: &str) -> Result<usize, DomainError> {
        let removed = self.vector_store.delete_by_document(document_id).await?;
        tracing::info!(document_id, removed, "deleted document chunks");
        Ok(removed)
    }

    pub async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<DocumentChunk>, DomainError> {
        self.vector_store.get_by_ids(ids).await
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>, DomainError> {
        self.vector_store.list_documents().await
    }

    pub async fn count(&self) -> Result<usize, DomainError> {
        self.vector_store.count().await
    }

    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<usize, DomainError> {
        let removed = self.vector_store.clear().await?;
        if removed == 0 {
            tracing::info!("collection is already empty");
        } else {
            tracing::info!(removed, "cleared collection");
        }
        Ok(removed)
    }
}

#[async_trait]
impl Retriever for RagService {
    async fn retrieve(
        &self,
        query: &str,
        n_results: usize,
    ) -> Result<Vec<SearchResult>, DomainError> {
        self.search(query, n_results, None).await
    }
}
