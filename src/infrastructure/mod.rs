pub mod agent;
pub mod config;
pub mod embedding;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod mcp;
pub mod tools;
pub mod vector_store;

pub use agent::ChatAgent;
pub use config::{
    AgentMode, AppConfig, ConfigError, McpSettings, McpTransport, PromptsConfig, SessionSettings,
    Settings,
};
pub use embedding::OpenAiEmbedding;
pub use llm::OpenAiLlm;
pub use mcp::{DocumentServer, McpRetriever};
pub use vector_store::{LocalVectorStore, QdrantVectorStore};
