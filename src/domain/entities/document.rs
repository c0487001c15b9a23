use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// File extensions accepted for ingestion, lower case with the leading dot.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".pdf", ".txt", ".md"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub chunk_index: usize,
    pub source_file: String,
    pub chunk_size: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    pub fn new(
        document_id: &str,
        source_file: &str,
        content: impl Into<String>,
        chunk_index: usize,
    ) -> Self {
        let content = content.into();
        Self {
            id: chunk_id(document_id, chunk_index),
            metadata: ChunkMetadata {
                document_id: document_id.to_string(),
                chunk_index,
                source_file: source_file.to_string(),
                chunk_size: content.chars().count(),
                timestamp: Utc::now(),
            },
            content,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.metadata.timestamp = timestamp;
        self
    }

    pub fn document_id(&self) -> &str {
        &self.metadata.document_id
    }
}

/// One entry per distinct document in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub source_file: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&ChunkMetadata> for DocumentSummary {
    fn from(metadata: &ChunkMetadata) -> Self {
        Self {
            document_id: metadata.document_id.clone(),
            source_file: metadata.source_file.clone(),
            timestamp: metadata.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: DocumentChunk,
    /// Smaller is closer.
    pub distance: f32,
    pub relevance_score: Option<f32>,
}

impl SearchResult {
    pub fn new(chunk: DocumentChunk, distance: f32) -> Self {
        Self {
            chunk,
            distance,
            relevance_score: None,
        }
    }
}

/// Equality constraints on chunk metadata. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub document_id: Option<String>,
    pub source_file: Option<String>,
}

impl SearchFilter {
    pub fn document(document_id: impl Into<String>) -> Self {
        Self {
            document_id: Some(document_id.into()),
            source_file: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.document_id.is_none() && self.source_file.is_none()
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.document_id
            .as_deref()
            .map_or(true, |id| id == metadata.document_id)
            && self
                .source_file
                .as_deref()
                .map_or(true, |file| file == metadata.source_file)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Stable identifier for a document source: `doc_` plus 12 hex digits of its digest.
pub fn document_id_for(source: &str) -> String {
    let digest = hex::encode(Sha256::digest(source.as_bytes()));
    format!("doc_{}", &digest[..12])
}

pub fn chunk_id(document_id: &str, chunk_index: usize) -> String {
    format!("{}_chunk_{}", document_id, chunk_index)
}

pub fn is_allowed_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Splits text into overlapping character windows.
///
/// Windows are `chunk_size` characters long and start every
/// `chunk_size - chunk_overlap` characters. Each window is trimmed and blank
/// windows are dropped; chunk indices stay sequential over the emitted chunks.
/// The last window is the one that reaches the end of the text.
pub fn chunk_text(
    text: &str,
    source_file: &str,
    document_id: &str,
    options: ChunkingOptions,
) -> Vec<DocumentChunk> {
    if text.trim().is_empty() || options.chunk_size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let step = options
        .chunk_size
        .saturating_sub(options.chunk_overlap)
        .max(1);
    let timestamp = Utc::now();

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + options.chunk_size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();

        if !trimmed.is_empty() {
            let chunk = DocumentChunk::new(document_id, source_file, trimmed, chunks.len())
                .with_timestamp(timestamp);
            chunks.push(chunk);
        }

        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}
