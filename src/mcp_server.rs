use rag_chat::application::RagService;
use rag_chat::infrastructure::{logging, vector_store, AppConfig, DocumentServer, OpenAiEmbedding};
use rmcp::{transport::stdio, ServiceExt};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let settings = &config.settings;
    // stdout carries the protocol
    logging::init(&settings.log_level, settings.log_json, std::io::stderr);

    settings.ensure_data_directories()?;

    let store = vector_store::open(settings).await?;
    let embedding = Arc::new(OpenAiEmbedding::from_settings(settings));
    let rag = Arc::new(RagService::new(embedding, store, settings.top_k_chunks));
    info!("vector store initialized for MCP server");

    info!("starting MCP server");
    let service = DocumentServer::new(rag)
        .serve(stdio())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "failed to start MCP server"))?;

    service.waiting().await?;
    info!("MCP server stopped");

    Ok(())
}
