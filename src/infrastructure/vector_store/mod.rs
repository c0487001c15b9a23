mod local;
mod qdrant;

pub use local::LocalVectorStore;
pub use qdrant::QdrantVectorStore;

use std::sync::Arc;

use crate::domain::{ports::VectorStore, DomainError};
use crate::infrastructure::config::Settings;

/// Qdrant when `QDRANT_URL` is set, otherwise the local store under `CHROMA_DB_PATH`.
pub async fn open(settings: &Settings) -> Result<Arc<dyn VectorStore>, DomainError> {
    match &settings.qdrant_url {
        Some(url) => Ok(Arc::new(
            QdrantVectorStore::new(
                url,
                &settings.chroma_collection_name,
                settings.embedding_dimension,
            )
            .await?,
        )),
        None => Ok(Arc::new(
            LocalVectorStore::open(
                &settings.chroma_db_path_resolved(),
                &settings.chroma_collection_name,
            )
            .await?,
        )),
    }
}
