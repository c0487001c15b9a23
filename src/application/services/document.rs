use std::path::Path;
use tracing::instrument;

use crate::domain::{chunk_text, document_id_for, ChunkingOptions, DocumentChunk, DomainError};
use crate::infrastructure::loader;

/// Loads documents and splits them into overlapping chunks.
pub struct DocumentProcessor {
    options: ChunkingOptions,
}

impl DocumentProcessor {
    pub fn new(options: ChunkingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> ChunkingOptions {
        self.options
    }

    /// Chunks `text`; the document id is derived from `source_file` when not given.
    pub fn chunk(
        &self,
        text: &str,
        source_file: &str,
        document_id: Option<&str>,
    ) -> Vec<DocumentChunk> {
        let document_id = document_id
            .map(str::to_string)
            .unwrap_or_else(|| document_id_for(source_file));
        let chunks = chunk_text(text, source_file, &document_id, self.options);

        tracing::info!(
            source_file,
            chunks = chunks.len(),
            size = self.options.chunk_size,
            overlap = self.options.chunk_overlap,
            "chunked document"
        );
        chunks
    }

    /// Loads a file from disk and chunks it. The document id is keyed on the absolute path.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn process_document(&self, path: &Path) -> Result<Vec<DocumentChunk>, DomainError> {
        let text = loader::load_document(path).await?;
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let source_file = path.to_string_lossy();
        let document_id = document_id_for(&absolute.to_string_lossy());

        Ok(self.chunk(&text, &source_file, Some(&document_id)))
    }

    /// Chunks uploaded bytes. Re-uploading the same file name yields the same document id.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn process_upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<DocumentChunk>, DomainError> {
        let text = loader::load_bytes(name, bytes).await?;
        Ok(self.chunk(&text, name, None))
    }
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new(ChunkingOptions::default())
    }
}
