//! Model Context Protocol surface: the document tool server and a client
//! that retrieves through it.

mod client;
mod server;

pub use client::{parse_search_results, resolve_command, McpRetriever};
pub use server::{DocumentServer, SERVER_NAME};
