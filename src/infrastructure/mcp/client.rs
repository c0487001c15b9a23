use async_trait::async_trait;
use rmcp::model::CallToolRequestParams;
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::{ConfigureCommandExt, IntoTransport, TokioChildProcess};
use rmcp::ServiceExt;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tokio::process::Command;

use crate::domain::{ports::Retriever, DomainError, SearchResult};
use crate::infrastructure::config::{McpSettings, McpTransport};

/// Retrieves through the document tool server's `search_documents` tool.
pub struct McpRetriever {
    service: RunningService<RoleClient, ()>,
}

impl McpRetriever {
    /// Spawns the configured server and completes the MCP handshake.
    pub async fn connect(settings: &McpSettings) -> Result<Self, DomainError> {
        match settings.transport {
            McpTransport::Stdio => {
                let program = resolve_command(&settings.command);
                tracing::info!(
                    command = %program.display(),
                    args = ?settings.args,
                    "starting MCP server"
                );

                let transport = TokioChildProcess::new(Command::new(&program).configure(|cmd| {
                    cmd.args(&settings.args);
                }))
                .map_err(|e| {
                    DomainError::external(format!("Failed to spawn MCP server: {e}"))
                })?;

                Self::from_transport(transport).await
            }
        }
    }

    /// Completes the handshake over an already established transport.
    pub async fn from_transport<T, E, A>(transport: T) -> Result<Self, DomainError>
    where
        T: IntoTransport<RoleClient, E, A>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let service = ()
            .serve(transport)
            .await
            .map_err(|e| DomainError::external(format!("Failed to connect MCP server: {e}")))?;

        let tools = service
            .list_tools(Default::default())
            .await
            .map_err(|e| DomainError::external(format!("Failed to list MCP tools: {e}")))?;
        tracing::info!(
            tools = ?tools.tools.iter().map(|t| t.name.to_string()).collect::<Vec<_>>(),
            "MCP client initialized"
        );

        Ok(Self { service })
    }

    pub async fn call(&self, tool: &str, arguments: Map<String, Value>) -> Result<String, DomainError> {
        tracing::info!(tool, ?arguments, "calling MCP tool");
        let params = CallToolRequestParams {
            name: tool.to_string().into(),
            arguments: Some(arguments),
            meta: None,
            task: None,
        };

        let result = self
            .service
            .call_tool(params)
            .await
            .map_err(|e| DomainError::external(format!("MCP tool {tool} failed: {e}")))?;

        match tool_output(&result) {
            (text, false) => Ok(text),
            (text, true) => Err(DomainError::external(format!("MCP tool {tool}: {text}"))),
        }
    }
}

#[async_trait]
impl Retriever for McpRetriever {
    async fn retrieve(
        &self,
        query: &str,
        n_results: usize,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let mut arguments = Map::new();
        arguments.insert("query".to_string(), Value::from(query));
        arguments.insert("n_results".to_string(), Value::from(n_results));

        let text = self.call("search_documents", arguments).await?;
        parse_search_results(&text)
    }
}

/// Bare command names resolve to a sibling of the running executable first,
/// then to `PATH`.
pub fn resolve_command(command: &str) -> PathBuf {
    let path = PathBuf::from(command);
    if path.components().count() > 1 {
        return path;
    }

    let sibling = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(command)))
        .filter(|candidate| candidate.is_file());

    sibling
        .or_else(|| which::which(command).ok())
        .unwrap_or(path)
}

pub fn parse_search_results(text: &str) -> Result<Vec<SearchResult>, DomainError> {
    serde_json::from_str(text)
        .map_err(|e| DomainError::external(format!("Unexpected search_documents output: {e}")))
}

/// Joined text content of a tool result, and whether the server flagged it as an error.
pub(crate) fn tool_output(result: &impl Serialize) -> (String, bool) {
    let value = serde_json::to_value(result).unwrap_or(Value::Null);

    let text = value
        .get("content")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    let is_error = value
        .get("isError")
        .or_else(|| value.get("is_error"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    (text, is_error)
}
