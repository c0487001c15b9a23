use rag_chat::api::{create_router, AppState, SessionLimits};
use rag_chat::application::{ChatService, DocumentProcessor, RagService, RetrievalService};
use rag_chat::domain::ports::{Assistant, Retriever};
use rag_chat::infrastructure::{
    logging, vector_store, AgentMode, AppConfig, ChatAgent, McpRetriever, OpenAiEmbedding,
    OpenAiLlm,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let settings = &config.settings;
    logging::init(&settings.log_level, settings.log_json, std::io::stdout);

    settings.ensure_data_directories()?;

    let store = vector_store::open(settings).await?;
    let embedding = Arc::new(OpenAiEmbedding::from_settings(settings));
    let rag = Arc::new(RagService::new(embedding, store, settings.top_k_chunks));
    info!(
        collection = %settings.chroma_collection_name,
        chunks = rag.count().await?,
        "vector store initialized"
    );

    let mut retrieval = RetrievalService::new(
        rag.clone(),
        settings.top_k_chunks,
        settings.relevance_threshold,
    );
    if settings.mcp.retrieval_enabled {
        match McpRetriever::connect(&settings.mcp).await {
            Ok(client) => {
                let client: Arc<dyn Retriever> = Arc::new(client);
                retrieval = retrieval.with_primary(client);
            }
            Err(e) => tracing::warn!(error = %e, "MCP client unavailable, using vector store only"),
        }
    }
    let retrieval = Arc::new(retrieval);

    let assistant: Arc<dyn Assistant> = match settings.agent_mode {
        AgentMode::Pipeline => Arc::new(ChatService::new(
            retrieval,
            Arc::new(OpenAiLlm::from_settings(settings)),
            config.prompts.clone(),
        )),
        AgentMode::React => Arc::new(ChatAgent::new(rag.clone(), &config)),
    };
    info!(mode = ?settings.agent_mode, model = %settings.openai_model, "agent initialized");

    let processor = Arc::new(DocumentProcessor::new(settings.chunking));
    let state = AppState::new(processor, rag, assistant)
        .with_max_upload_bytes(settings.max_upload_bytes)
        .with_session_limits(SessionLimits {
            max_messages: settings.sessions.max_messages,
            idle_timeout: settings.sessions.idle_timeout,
            max_sessions: settings.sessions.max_sessions,
        });
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind((settings.server.host.as_str(), settings.server.port)).await?;
    info!("API server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
