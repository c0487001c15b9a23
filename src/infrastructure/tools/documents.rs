use rig::completion::ToolDefinition;
use rig::tool::Tool;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::application::RagService;
use crate::domain::{DocumentSummary, SearchResult};

pub const QUERY_REQUIRED: &str = "Error: Query is required";
pub const NO_RESULTS: &str = "No relevant documents found.";
pub const NO_DOCUMENTS: &str = "No documents in the collection.";

#[derive(Debug, thiserror::Error)]
#[error("Document tool error: {0}")]
pub struct DocumentToolError(pub String);

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct SearchArgs {
    /// The search query to find relevant document chunks
    pub query: String,
    /// Number of results to return (default: 5)
    #[serde(default)]
    pub n_results: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct ListDocumentsArgs {}

/// One `Result {i}` block per hit, numbered from 1.
pub fn format_context(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "Result {}:\nSource: {}\nChunk Index: {}\nContent: {}\nRelevance Score: {:.3}\n",
                i + 1,
                r.chunk.metadata.source_file,
                r.chunk.metadata.chunk_index,
                r.chunk.content,
                1.0 - r.distance
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_document_list(documents: &[DocumentSummary]) -> String {
    if documents.is_empty() {
        return NO_DOCUMENTS.to_string();
    }

    let mut text = format!("Found {} document(s):\n\n", documents.len());
    for (i, doc) in documents.iter().enumerate() {
        text.push_str(&format!(
            "{}. Document ID: {}\n   Source File: {}\n   Timestamp: {}\n\n",
            i + 1,
            doc.document_id,
            doc.source_file,
            doc.timestamp.to_rfc3339()
        ));
    }
    text
}

/// Searches and renders hits as text. Failures are reported in the text itself.
pub async fn document_context(rag: &RagService, args: &SearchArgs) -> String {
    if args.query.trim().is_empty() {
        return QUERY_REQUIRED.to_string();
    }

    let n_results = args
        .n_results
        .filter(|n| *n > 0)
        .unwrap_or(rag.default_top_k());
    match rag.search(&args.query, n_results, None).await {
        Ok(results) => format_context(&results),
        Err(e) => {
            tracing::error!(error = %e, "error in get_document_context");
            format!("Error: {e}")
        }
    }
}

pub async fn document_list(rag: &RagService) -> String {
    match rag.list_documents().await {
        Ok(documents) => format_document_list(&documents),
        Err(e) => {
            tracing::error!(error = %e, "error in list_documents");
            format!("Error: {e}")
        }
    }
}

fn search_parameters() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "The search query to find relevant document chunks"
            },
            "n_results": {
                "type": "integer",
                "description": "Number of results to return (default: 5)"
            }
        },
        "required": ["query"]
    })
}

pub struct SearchDocumentsTool {
    rag: Arc<RagService>,
}

impl SearchDocumentsTool {
    pub fn new(rag: Arc<RagService>) -> Self {
        Self { rag }
    }
}

impl Tool for SearchDocumentsTool {
    const NAME: &'static str = "search_documents";

    type Error = DocumentToolError;
    type Args = SearchArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Search documents using semantic similarity. Returns the most relevant \
                          chunks from the document collection."
                .to_string(),
            parameters: search_parameters(),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        tracing::info!(tool = Self::NAME, query = %args.query, "tool called");
        Ok(document_context(&self.rag, &args).await)
    }
}

pub struct DocumentContextTool {
    rag: Arc<RagService>,
}

impl DocumentContextTool {
    pub fn new(rag: Arc<RagService>) -> Self {
        Self { rag }
    }
}

impl Tool for DocumentContextTool {
    const NAME: &'static str = "get_document_context";

    type Error = DocumentToolError;
    type Args = SearchArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Retrieve relevant document chunks based on a query. Searches the \
                          vector store for semantically similar content."
                .to_string(),
            parameters: search_parameters(),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        tracing::info!(tool = Self::NAME, query = %args.query, "tool called");
        Ok(document_context(&self.rag, &args).await)
    }
}

pub struct ListDocumentsTool {
    rag: Arc<RagService>,
}

impl ListDocumentsTool {
    pub fn new(rag: Arc<RagService>) -> Self {
        Self { rag }
    }
}

impl Tool for ListDocumentsTool {
    const NAME: &'static str = "list_documents";

    type Error = DocumentToolError;
    type Args = ListDocumentsArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "List all documents available in the collection.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    async fn call(&self, _args: Self::Args) -> Result<Self::Output, Self::Error> {
        tracing::info!(tool = Self::NAME, "tool called");
        Ok(document_list(&self.rag).await)
    }
}
