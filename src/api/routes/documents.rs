use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{error::ApiError, state::AppState};
use crate::application::services::relevance_from_distance;
use crate::domain::{
    is_allowed_extension, DocumentChunk, DocumentSummary, DomainError, SearchFilter,
    ALLOWED_EXTENSIONS,
};

pub const NO_CONTENT_EXTRACTED: &str = "No content extracted from the document.";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub document_id: String,
    pub source_file: String,
    pub chunks_added: usize,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct TextDocumentRequest {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub document_id: String,
    pub chunks_removed: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: usize,
    pub sessions_cleared: usize,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchDocumentsRequest {
    pub query: String,
    pub top_k: Option<usize>,
    pub document_id: Option<String>,
    pub source_file: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResultResponse {
    pub chunk_id: String,
    pub document_id: String,
    pub source_file: String,
    pub chunk_index: usize,
    pub content: String,
    pub distance: f32,
    pub relevance_score: f32,
}

#[derive(Debug, Deserialize)]
pub struct ChunksRequest {
    pub ids: Vec<String>,
}

async fn index(
    state: &AppState,
    source_file: &str,
    chunks: Vec<DocumentChunk>,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let Some(document_id) = chunks.first().map(|c| c.document_id().to_string()) else {
        tracing::warn!(source_file, "no content extracted");
        return Err(ApiError::unprocessable(NO_CONTENT_EXTRACTED));
    };

    let added = state.rag.index_chunks(&chunks).await?;
    tracing::info!(source_file, chunks = added, "processed document");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            document_id,
            source_file: source_file.to_string(),
            chunks_added: added,
            message: format!(
                "Document '{source_file}' processed successfully! Added {added} chunks to the collection."
            ),
        }),
    ))
}

/// Multipart upload; the file is read from the `file` field.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = field
            .file_name()
            .map(str::to_string)
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("Uploaded file has no name"))?;
        if !is_allowed_extension(&name) {
            return Err(DomainError::unsupported(ALLOWED_EXTENSIONS.join(", ")).into());
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;

        let chunks = state.processor.process_upload(&name, bytes.to_vec()).await?;
        return index(&state, &name, chunks).await;
    }

    Err(ApiError::bad_request("Missing `file` field"))
}

pub async fn ingest_text(
    State(state): State<AppState>,
    Json(request): Json<TextDocumentRequest>,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("Document name is required"));
    }

    let chunks = state.processor.chunk(&request.content, &request.name, None);
    index(&state, &request.name, chunks).await
}

pub async fn list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentListResponse>, ApiError> {
    let documents = state.rag.list_documents().await?;
    Ok(Json(DocumentListResponse {
        total: documents.len(),
        documents,
    }))
}

pub async fn count_chunks(State(state): State<AppState>) -> Result<Json<CountResponse>, ApiError> {
    Ok(Json(CountResponse {
        count: state.rag.count().await?,
    }))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let removed = state.rag.delete_document(&id).await?;
    if removed == 0 {
        return Err(ApiError::not_found(format!("Document {id} not found")));
    }

    Ok(Json(DeleteResponse {
        document_id: id,
        chunks_removed: removed,
    }))
}

/// Empties the collection and drops every chat session with it.
pub async fn clear_collection(
    State(state): State<AppState>,
) -> Result<Json<ClearResponse>, ApiError> {
    let cleared = state.rag.clear().await?;
    let sessions_cleared = state.sessions.clear().await;

    Ok(Json(ClearResponse {
        cleared,
        sessions_cleared,
        message: format!("Cleared {cleared} chunks from the collection!"),
    }))
}

pub async fn search_documents(
    State(state): State<AppState>,
    Json(request): Json<SearchDocumentsRequest>,
) -> Result<Json<Vec<SearchResultResponse>>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::bad_request("Query is required"));
    }

    let filter = SearchFilter {
        document_id: request.document_id,
        source_file: request.source_file,
    };
    let top_k = request
        .top_k
        .filter(|k| *k > 0)
        .unwrap_or(state.rag.default_top_k());

    let results = state
        .rag
        .search(&request.query, top_k, Some(&filter).filter(|f| !f.is_empty()))
        .await?;

    Ok(Json(
        results
            .into_iter()
            .map(|r| SearchResultResponse {
                relevance_score: relevance_from_distance(r.distance),
                distance: r.distance,
                chunk_id: r.chunk.id,
                document_id: r.chunk.metadata.document_id,
                source_file: r.chunk.metadata.source_file,
                chunk_index: r.chunk.metadata.chunk_index,
                content: r.chunk.content,
            })
            .collect(),
    ))
}

pub async fn get_chunks(
    State(state): State<AppState>,
    Json(request): Json<ChunksRequest>,
) -> Result<Json<Vec<DocumentChunk>>, ApiError> {
    Ok(Json(state.rag.get_by_ids(&request.ids).await?))
}
