//! Application layer - Use cases and orchestration.
//!
//! Services here depend on domain ports (traits) rather than concrete
//! implementations: document processing, indexing and vector search,
//! hybrid retrieval, and the retrieve-then-answer chat pipeline.

pub mod services;

pub use services::{ChatService, DocumentProcessor, RagService, RetrievalService};
