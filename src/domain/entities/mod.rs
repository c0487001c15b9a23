mod conversation;
mod document;
mod embedding;
mod text;

pub use conversation::{trimmed_history, Conversation, Message, MessageRole, MAX_HISTORY_MESSAGES};
pub use document::{
    chunk_id, chunk_text, document_id_for, is_allowed_extension, ChunkMetadata, ChunkingOptions,
    DocumentChunk, DocumentSummary, SearchFilter, SearchResult, ALLOWED_EXTENSIONS,
};
pub use embedding::Embedding;
pub use text::sanitize_text;
