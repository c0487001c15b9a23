mod chat;
mod document;
mod rag;
mod retrieval;

pub use chat::{ChatService, FALLBACK_REPLY};
pub use document::DocumentProcessor;
pub use rag::RagService;
pub use retrieval::{relevance_from_distance, RetrievalService};
