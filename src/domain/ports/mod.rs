mod assistant;
mod embedding;
mod llm;
mod retriever;
mod vector_store;

pub use assistant::{Answer, Assistant, SourceRef};
pub use embedding::EmbeddingService;
pub use llm::LlmService;
pub use retriever::Retriever;
pub use vector_store::VectorStore;
