use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeleteCollectionBuilder,
    DeletePointsBuilder, Distance, Filter, GetPointsBuilder, PointId, PointStruct,
    ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

use crate::domain::{
    ports::VectorStore, ChunkMetadata, DocumentChunk, DocumentSummary, DomainError, Embedding,
    SearchFilter, SearchResult,
};

const SCROLL_PAGE: u32 = 256;

pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantVectorStore {
    pub async fn new(url: &str, collection: &str, dimension: usize) -> Result<Self, DomainError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| DomainError::external(e.to_string()))?;

        let store = Self {
            client,
            collection: collection.to_string(),
            dimension,
        };

        store.ensure_collection().await?;
        tracing::info!(url, collection, "connected to qdrant");

        Ok(store)
    }

    async fn ensure_collection(&self) -> Result<(), DomainError> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| DomainError::external(e.to_string()))?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection).vectors_config(
                        VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(|e| DomainError::external(e.to_string()))?;
        }

        Ok(())
    }

    /// Qdrant wants integer or UUID ids; chunk ids are strings, so hash them.
    fn point_id(chunk_id: &str) -> u64 {
        let digest = Sha256::digest(chunk_id.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }

    fn filter_for(filter: &SearchFilter) -> Filter {
        let mut conditions = Vec::new();
        if let Some(document_id) = &filter.document_id {
            conditions.push(Condition::matches("document_id", document_id.clone()));
        }
        if let Some(source_file) = &filter.source_file {
            conditions.push(Condition::matches("source_file", source_file.clone()));
        }
        Filter::must(conditions)
    }

    fn prune_filter(document_id: &str, keep: &[String]) -> Filter {
        let mut filter = Self::filter_for(&SearchFilter::document(document_id));
        if !keep.is_empty() {
            filter.must_not = vec![Condition::matches("chunk_id", keep.to_vec())];
        }
        filter
    }

    fn payload_for(chunk: &DocumentChunk) -> Result<Payload, DomainError> {
        serde_json::json!({
            "chunk_id": chunk.id,
            "content": chunk.content,
            "document_id": chunk.metadata.document_id,
            "chunk_index": chunk.metadata.chunk_index,
            "source_file": chunk.metadata.source_file,
            "chunk_size": chunk.metadata.chunk_size,
            "timestamp": chunk.metadata.timestamp.to_rfc3339(),
        })
        .try_into()
        .map_err(|_| DomainError::internal("Failed to create payload"))
    }

    fn chunk_from_payload(payload: &HashMap<String, Value>) -> Option<DocumentChunk> {
        let text = |key: &str| payload.get(key)?.as_str().map(|s| s.to_string());
        let number = |key: &str| payload.get(key)?.as_integer().map(|n| n as usize);

        let timestamp = text("timestamp")
            .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Some(DocumentChunk {
            id: text("chunk_id")?,
            content: text("content")?,
            metadata: ChunkMetadata {
                document_id: text("document_id")?,
                chunk_index: number("chunk_index")?,
                source_file: text("source_file").unwrap_or_default(),
                chunk_size: number("chunk_size").unwrap_or_default(),
                timestamp,
            },
        })
    }

    async fn count_matching(&self, filter: Option<Filter>) -> Result<usize, DomainError> {
        let mut request = CountPointsBuilder::new(&self.collection).exact(true);
        if let Some(filter) = filter {
            request = request.filter(filter);
        }

        let response = self
            .client
            .count(request)
            .await
            .map_err(|e| DomainError::external(e.to_string()))?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn add(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[Embedding],
    ) -> Result<(), DomainError> {
        if chunks.len() != embeddings.len() {
            return Err(DomainError::validation(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let points = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                Ok(PointStruct::new(
                    Self::point_id(&chunk.id),
                    embedding.as_slice().to_vec(),
                    Self::payload_for(chunk)?,
                ))
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| DomainError::external(e.to_string()))?;

        Ok(())
    }

    async fn search(
        &self,
        query: &Embedding,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let mut request =
            SearchPointsBuilder::new(&self.collection, query.as_slice().to_vec(), top_k as u64)
                .with_payload(true);
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            request = request.filter(Self::filter_for(filter));
        }

        let results = self
            .client
            .search_points(request)
            .await
            .map_err(|e| DomainError::external(e.to_string()))?;

        // Cosine collections report similarity; turn it back into a distance.
        Ok(results
            .result
            .into_iter()
            .filter_map(|point| {
                let chunk = Self::chunk_from_payload(&point.payload)?;
                Some(SearchResult::new(chunk, 1.0 - point.score))
            })
            .collect())
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<DocumentChunk>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let point_ids: Vec<PointId> = ids.iter().map(|id| Self::point_id(id).into()).collect();
        let response = self
            .client
            .get_points(GetPointsBuilder::new(&self.collection, point_ids).with_payload(true))
            .await
            .map_err(|e| DomainError::external(e.to_string()))?;

        let found: Vec<DocumentChunk> = response
            .result
            .iter()
            .filter_map(|point| Self::chunk_from_payload(&point.payload))
            .collect();

        Ok(ids
            .iter()
            .filter_map(|id| found.iter().find(|c| &c.id == id).cloned())
            .collect())
    }

    async fn prune_document(
        &self,
        document_id: &str,
        keep: &[String],
    ) -> Result<usize, DomainError> {
        let filter = Self::prune_filter(document_id, keep);
        let removed = self.count_matching(Some(filter.clone())).await?;
        if removed == 0 {
            return Ok(0);
        }

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(filter)
                    .wait(true),
            )
            .await
            .map_err(|e| DomainError::external(e.to_string()))?;

        Ok(removed)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, DomainError> {
        let mut seen = HashSet::new();
        let mut documents = Vec::new();
        let mut offset: Option<PointId> = None;

        loop {
            let mut request = ScrollPointsBuilder::new(&self.collection)
                .limit(SCROLL_PAGE)
                .with_payload(true)
                .with_vectors(false);
            if let Some(offset) = offset.take() {
                request = request.offset(offset);
            }

            let page = self
                .client
                .scroll(request)
                .await
                .map_err(|e| DomainError::external(e.to_string()))?;

            for point in &page.result {
                if let Some(chunk) = Self::chunk_from_payload(&point.payload) {
                    if seen.insert(chunk.metadata.document_id.clone()) {
                        documents.push(DocumentSummary::from(&chunk.metadata));
                    }
                }
            }

            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(documents)
    }

    async fn count(&self) -> Result<usize, DomainError> {
        self.count_matching(None).await
    }

    async fn clear(&self) -> Result<usize, DomainError> {
        let removed = self.count_matching(None).await?;

        self.client
            .delete_collection(DeleteCollectionBuilder::new(&self.collection))
            .await
            .map_err(|e| DomainError::external(e.to_string()))?;
        self.ensure_collection().await?;

        Ok(removed)
    }
}
