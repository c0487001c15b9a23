use rmcp::handler::server::{router::tool::ToolRouter, wrapper::Parameters};
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use std::sync::Arc;

use crate::application::RagService;
use crate::infrastructure::tools::{
    document_context, document_list, ListDocumentsArgs, SearchArgs, QUERY_REQUIRED,
};

pub const SERVER_NAME: &str = "rag-document-server";

/// Exposes the document collection as MCP tools.
#[derive(Clone)]
pub struct DocumentServer {
    rag: Arc<RagService>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl DocumentServer {
    pub fn new(rag: Arc<RagService>) -> Self {
        Self {
            rag,
            tool_router: Self::tool_router(),
        }
    }

    /// Results as a JSON array, so clients can rebuild them.
    #[tool(
        description = "Search documents using semantic similarity. Returns the most relevant chunks from the document collection."
    )]
    pub async fn search_documents(
        &self,
        Parameters(args): Parameters<SearchArgs>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "search_documents", query = %args.query, n_results = ?args.n_results, "tool called");

        if args.query.trim().is_empty() {
            return Ok(CallToolResult::error(vec![Content::text(QUERY_REQUIRED)]));
        }

        let n_results = args
            .n_results
            .filter(|n| *n > 0)
            .unwrap_or(self.rag.default_top_k());
        match self.rag.search(&args.query, n_results, None).await {
            Ok(results) => {
                let json = serde_json::to_string(&results)
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?;
                Ok(CallToolResult::success(vec![Content::text(json)]))
            }
            Err(e) => {
                tracing::error!(error = %e, "error in search_documents");
                Ok(CallToolResult::error(vec![Content::text(format!("Error: {e}"))]))
            }
        }
    }

    #[tool(
        description = "Retrieve relevant document chunks based on a query. Searches the vector store for semantically similar content."
    )]
    pub async fn get_document_context(
        &self,
        Parameters(args): Parameters<SearchArgs>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "get_document_context", query = %args.query, "tool called");
        let text = document_context(&self.rag, &args).await;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(description = "List all documents available in the collection.")]
    pub async fn list_documents(
        &self,
        Parameters(_args): Parameters<ListDocumentsArgs>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "list_documents", "tool called");
        let text = document_list(&self.rag).await;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[tool_handler]
impl ServerHandler for DocumentServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Search, read and list the documents indexed for question answering.".to_string(),
            ),
            ..Default::default()
        }
    }
}
