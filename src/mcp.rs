//! MCP server over stdio.
//!
//! Exposes `search_repo` and `search_docs` as MCP tools. Each call returns
//! one text content block per result (numbered, labelled, truncated), so an
//! editor can show results individually. Retrieval failures are reported as
//! text blocks rather than protocol errors; only an unknown tool or a
//! missing `query` argument is a protocol error.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt};
use tracing::{debug, info, warn};

use repo_harness_core::agent::{search_scoped, FallbackPolicy, SearchTool};
use repo_harness_core::assemble::annotate;

use crate::collections::{CollectionRegistry, RegistryRetriever};

#[derive(Clone)]
pub struct StdioBridge {
    retriever: Arc<RegistryRetriever>,
    k: usize,
}

fn missing_data_message(tool: SearchTool) -> &'static str {
    match tool {
        SearchTool::Repo => "No repository data found. Please run ingestion first.",
        SearchTool::Docs => "No documentation data found. Please run documentation ingestion first.",
    }
}

impl StdioBridge {
    pub fn new(registry: Arc<CollectionRegistry>, collection: &str, k: usize) -> Self {
        Self {
            retriever: Arc::new(RegistryRetriever::new(registry, collection)),
            k,
        }
    }

    fn to_mcp_tool(tool: SearchTool) -> Tool {
        let input_schema = match tool.input_schema() {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };

        Tool {
            name: Cow::Borrowed(tool.name()),
            title: None,
            description: Some(Cow::Borrowed(tool.mcp_description())),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(true)),
            execution: None,
            icons: None,
            meta: None,
        }
    }

    /// Text blocks for one tool call.
    pub async fn run_tool(
        &self,
        name: &str,
        arguments: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> Result<Vec<String>, McpError> {
        let tool: SearchTool = name.parse().map_err(|_| {
            McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", name),
                None,
            )
        })?;

        let query = arguments
            .and_then(|args| args.get("query"))
            .and_then(|q| q.as_str())
            .ok_or_else(|| {
                McpError::new(
                    ErrorCode::INVALID_PARAMS,
                    format!("{} requires a string 'query' argument", name),
                    None,
                )
            })?;
        debug!(tool = %tool, query, "stdio tool call");

        // Docs search falls back to the whole collection when no docs match.
        let outcome = search_scoped(
            self.retriever.as_ref(),
            tool,
            query,
            self.k,
            FallbackPolicy::UnfilteredOnEmpty,
        )
        .await;

        Ok(match outcome {
            Ok(Some(results)) => annotate(&results),
            Ok(None) => vec![missing_data_message(tool).to_string()],
            Err(e) => {
                warn!(tool = %tool, error = %e, "stdio search failed");
                vec![format!("Error searching {}: {}", tool.scope(), e)]
            }
        })
    }
}

impl ServerHandler for StdioBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "repo-harness".to_string(),
                title: Some("Repo Harness".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Search an ingested code repository and its documentation. \
                 Use search_repo for source code and search_docs for documentation pages."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = SearchTool::ALL.into_iter().map(Self::to_mcp_tool).collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        name.parse::<SearchTool>().ok().map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let blocks = self.run_tool(&request.name, request.arguments.as_ref()).await?;
        Ok(CallToolResult::success(
            blocks.into_iter().map(Content::text).collect(),
        ))
    }
}

/// Serve `bridge` on stdin/stdout until the client disconnects.
pub async fn serve_stdio(bridge: StdioBridge) -> anyhow::Result<()> {
    info!("MCP stdio server starting");
    bridge.serve(rmcp::transport::stdio()).await?.waiting().await?;
    info!("MCP stdio server stopped");
    Ok(())
}
