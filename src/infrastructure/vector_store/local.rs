use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::domain::{
    ports::VectorStore, DocumentChunk, DocumentSummary, DomainError, Embedding, SearchFilter,
    SearchResult,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    chunk: DocumentChunk,
    embedding: Embedding,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    collection: String,
    records: Vec<Record>,
}

#[derive(Default)]
struct State {
    records: Vec<Record>,
    /// Modification time of the file as of the last load or write.
    synced_at: Option<SystemTime>,
}

/// Brute-force cosine store persisted as one JSON file per collection.
///
/// Every mutation rewrites the file through a temporary file and rename. Before
/// each operation the file's modification time is compared with the last
/// sync, so a second process sharing the directory sees fresh data.
pub struct LocalVectorStore {
    collection: String,
    path: Option<PathBuf>,
    state: RwLock<State>,
}

impl LocalVectorStore {
    pub fn in_memory() -> Self {
        Self {
            collection: "memory".to_string(),
            path: None,
            state: RwLock::new(State::default()),
        }
    }

    pub async fn open(dir: &Path, collection: &str) -> Result<Self, DomainError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{collection}.json"));

        let store = Self {
            collection: collection.to_string(),
            path: Some(path.clone()),
            state: RwLock::new(State::default()),
        };
        {
            let state = store.synced().await?;
            tracing::info!(
                path = %path.display(),
                collection,
                chunks = state.records.len(),
                "opened local vector store"
            );
        }
        Ok(store)
    }

    async fn modified(path: &Path) -> Option<SystemTime> {
        tokio::fs::metadata(path).await.ok()?.modified().ok()
    }

    /// Write access to the state, reloaded first if the file changed underneath us.
    async fn synced(&self) -> Result<RwLockWriteGuard<'_, State>, DomainError> {
        let mut state = self.state.write().await;
        let Some(path) = &self.path else {
            return Ok(state);
        };

        let modified = Self::modified(path).await;
        if modified.is_some() && modified != state.synced_at {
            let raw = tokio::fs::read(path).await?;
            let snapshot: Snapshot = serde_json::from_slice(&raw).map_err(|e| {
                DomainError::internal(format!("corrupt vector store {}: {e}", path.display()))
            })?;
            state.records = snapshot.records;
            state.synced_at = modified;
        }
        Ok(state)
    }

    /// Writes `records` to disk and only then installs them as the live state.
    /// On failure the state is left exactly as it was.
    async fn commit(&self, state: &mut State, records: Vec<Record>) -> Result<(), DomainError> {
        let Some(path) = &self.path else {
            state.records = records;
            return Ok(());
        };

        let snapshot = Snapshot {
            collection: self.collection.clone(),
            records,
        };
        let json = serde_json::to_vec(&snapshot)
            .map_err(|e| DomainError::internal(format!("failed to encode vector store: {e}")))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;

        state.records = snapshot.records;
        state.synced_at = Self::modified(path).await;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
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

        let mut state = self.synced().await?;
        let ids: HashSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        let mut records: Vec<Record> = state
            .records
            .iter()
            .filter(|r| !ids.contains(r.chunk.id.as_str()))
            .cloned()
            .collect();
        records.extend(chunks.iter().zip(embeddings).map(|(chunk, embedding)| Record {
            chunk: chunk.clone(),
            embedding: embedding.clone(),
        }));

        self.commit(&mut state, records).await
    }

    async fn search(
        &self,
        query: &Embedding,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let state = self.synced().await?;

        let mut results: Vec<SearchResult> = state
            .records
            .iter()
            .filter(|r| filter.map_or(true, |f| f.matches(&r.chunk.metadata)))
            .map(|r| SearchResult::new(r.chunk.clone(), query.cosine_distance(&r.embedding)))
            .collect();

        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);
        Ok(results)
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<DocumentChunk>, DomainError> {
        let state = self.synced().await?;
        Ok(ids
            .iter()
            .filter_map(|id| state.records.iter().find(|r| &r.chunk.id == id))
            .map(|r| r.chunk.clone())
            .collect())
    }

    async fn prune_document(
        &self,
        document_id: &str,
        keep: &[String],
    ) -> Result<usize, DomainError> {
        let mut state = self.synced().await?;
        let records: Vec<Record> = state
            .records
            .iter()
            .filter(|r| r.chunk.metadata.document_id != document_id || keep.contains(&r.chunk.id))
            .cloned()
            .collect();
        let removed = state.records.len() - records.len();

        if removed > 0 {
            self.commit(&mut state, records).await?;
        }
        Ok(removed)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, DomainError> {
        let state = self.synced().await?;
        let mut seen = HashSet::new();
        Ok(state
            .records
            .iter()
            .filter(|r| seen.insert(r.chunk.metadata.document_id.clone()))
            .map(|r| DocumentSummary::from(&r.chunk.metadata))
            .collect())
    }

    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.synced().await?.records.len())
    }

    async fn clear(&self) -> Result<usize, DomainError> {
        let mut state = self.synced().await?;
        let removed = state.records.len();
        if removed > 0 {
            self.commit(&mut state, Vec::new()).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc: &str, index: usize) -> DocumentChunk {
        DocumentChunk::new(doc, &format!("{doc}.txt"), format!("content {index}"), index)
    }

    #[tokio::test]
    async fn test_add_and_search() {
        let store = LocalVectorStore::in_memory();
        store
            .add(
                &[chunk("doc_a", 0), chunk("doc_a", 1)],
                &[
                    Embedding::new(vec![1.0, 0.0, 0.0]),
                    Embedding::new(vec![0.0, 1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let query = Embedding::new(vec![1.0, 0.0, 0.0]);
        let results = store.search(&query, 1, None).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "doc_a_chunk_0");
        assert!(results[0].distance.abs() < 0.001);
    }

    #[tokio::test]
    async fn test_add_replaces_same_id() {
        let store = LocalVectorStore::in_memory();
        let embedding = Embedding::new(vec![1.0, 0.0]);
        store.add(&[chunk("doc_a", 0)], &[embedding.clone()]).await.unwrap();
        store.add(&[chunk("doc_a", 0)], &[embedding]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mismatched_lengths_rejected() {
        let store = LocalVectorStore::in_memory();
        let err = store.add(&[chunk("doc_a", 0)], &[]).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn test_search_with_filter() {
        let store = LocalVectorStore::in_memory();
        let embedding = Embedding::new(vec![1.0, 0.0]);
        store
            .add(
                &[chunk("doc_a", 0), chunk("doc_b", 0)],
                &[embedding.clone(), embedding.clone()],
            )
            .await
            .unwrap();

        let filter = SearchFilter::document("doc_b");
        let results = store.search(&embedding, 10, Some(&filter)).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.metadata.document_id, "doc_b");
    }

    #[tokio::test]
    async fn test_delete_by_document() {
        let store = LocalVectorStore::in_memory();
        let embedding = Embedding::new(vec![1.0, 0.0, 0.0]);
        store
            .add(
                &[chunk("doc_a", 0), chunk("doc_a", 1), chunk("doc_b", 0)],
                &[embedding.clone(), embedding.clone(), embedding.clone()],
            )
            .await
            .unwrap();

        assert_eq!(store.delete_by_document("doc_a").await.unwrap(), 2);
        assert_eq!(store.delete_by_document("doc_a").await.unwrap(), 0);

        let docs = store.list_documents().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].document_id, "doc_b");
    }

    #[tokio::test]
    async fn test_prune_document_keeps_listed_ids() {
        let store = LocalVectorStore::in_memory();
        let embedding = Embedding::new(vec![1.0]);
        store
            .add(
                &[chunk("doc_a", 0), chunk("doc_a", 1), chunk("doc_b", 0)],
                &[embedding.clone(), embedding.clone(), embedding],
            )
            .await
            .unwrap();

        let removed = store
            .prune_document("doc_a", &["doc_a_chunk_0".to_string()])
            .await
            .unwrap();

        assert_eq!(removed, 1);
        let ids = vec!["doc_a_chunk_0".to_string(), "doc_a_chunk_1".to_string(), "doc_b_chunk_0".to_string()];
        let left: Vec<String> = store.get_by_ids(&ids).await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(left, vec!["doc_a_chunk_0", "doc_b_chunk_0"]);
    }

    #[tokio::test]
    async fn test_get_by_ids_keeps_request_order() {
        let store = LocalVectorStore::in_memory();
        let embedding = Embedding::new(vec![1.0]);
        store
            .add(
                &[chunk("doc_a", 0), chunk("doc_a", 1)],
                &[embedding.clone(), embedding],
            )
            .await
            .unwrap();

        let ids = vec![
            "doc_a_chunk_1".to_string(),
            "missing".to_string(),
            "doc_a_chunk_0".to_string(),
        ];
        let chunks = store.get_by_ids(&ids).await.unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "doc_a_chunk_1");
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalVectorStore::open(dir.path(), "documents").await.unwrap();
            store
                .add(&[chunk("doc_a", 0)], &[Embedding::new(vec![0.5, 0.5])])
                .await
                .unwrap();
        }

        let reopened = LocalVectorStore::open(dir.path(), "documents").await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        assert!(dir.path().join("documents.json").exists());

        assert_eq!(reopened.clear().await.unwrap(), 1);
        let again = LocalVectorStore::open(dir.path(), "documents").await.unwrap();
        assert_eq!(again.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sees_writes_from_another_instance() {
        let dir = tempfile::tempdir().unwrap();
        let reader = LocalVectorStore::open(dir.path(), "shared").await.unwrap();
        let writer = LocalVectorStore::open(dir.path(), "shared").await.unwrap();

        assert_eq!(reader.count().await.unwrap(), 0);
        writer
            .add(&[chunk("doc_a", 0)], &[Embedding::new(vec![1.0])])
            .await
            .unwrap();

        assert_eq!(reader.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_collection_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path(), "documents").await.unwrap();
        store
            .add(&[chunk("doc_a", 0)], &[Embedding::new(vec![1.0, 0.0])])
            .await
            .unwrap();

        // a directory in place of the temp file makes every write fail
        std::fs::create_dir(dir.path().join("documents.json.tmp")).unwrap();

        assert!(store
            .add(&[chunk("doc_b", 0)], &[Embedding::new(vec![0.0, 1.0])])
            .await
            .is_err());
        assert!(store.delete_by_document("doc_a").await.is_err());
        assert!(store.clear().await.is_err());

        assert_eq!(store.count().await.unwrap(), 1);
        let docs = store.list_documents().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].document_id, "doc_a");

        let reopened = LocalVectorStore::open(dir.path(), "documents").await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }
}
