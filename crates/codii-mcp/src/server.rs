//! MCP server implementation

use crate::protocol::*;
use crate::tools;
use anyhow::Result;
use codii_core::Indexer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

pub struct McpServer {
    indexer: Indexer,
}

impl McpServer {
    pub fn new(indexer: Indexer) -> Self {
        Self { indexer }
    }

    pub async fn run(&self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let stdout = tokio::io::stdout();

        let mut reader = BufReader::new(stdin);
        let mut writer = BufWriter::new(stdout);
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(e) => {
                    let response =
                        JsonRpcResponse::error(None, -32700, &format!("Parse error: {e}"));
                    self.write_response(&mut writer, &response).await?;
                    continue;
                }
            };

            let response = self.handle_request(&request);
            self.write_response(&mut writer, &response).await?;
        }

        Ok(())
    }

    async fn write_response<W: AsyncWriteExt + Unpin>(
        &self,
        writer: &mut W,
        response: &JsonRpcResponse,
    ) -> Result<()> {
        let json = serde_json::to_string(response)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    fn handle_request(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request),
            "tools/list" => self.handle_tools_list(request),
            "tools/call" => self.handle_tools_call(request),
            _ => JsonRpcResponse::error(
                request.id.clone(),
                -32601,
                &format!("Method not found: {}", request.method),
            ),
        }
    }

    fn handle_initialize(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let result = serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": "codii",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        JsonRpcResponse::success(request.id.clone(), result)
    }

    fn handle_tools_list(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let tools = vec![
            tools::index_codebase_definition(),
            tools::search_code_definition(),
            tools::get_indexing_status_definition(),
            tools::clear_index_definition(),
        ];
        JsonRpcResponse::success(request.id.clone(), serde_json::json!({ "tools": tools }))
    }

    fn handle_tools_call(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let name = request
            .params
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let arguments = request
            .params
            .get("arguments")
            .cloned()
            .unwrap_or(serde_json::json!({}));

        let result = match name {
            "index_codebase" => tools::handle_index_codebase(&self.indexer, arguments),
            "search_code" => tools::handle_search_code(&self.indexer, arguments),
            "get_indexing_status" => tools::handle_get_indexing_status(&self.indexer, arguments),
            "clear_index" => tools::handle_clear_index(&self.indexer, arguments),
            _ => Ok(ToolResult::error(format!("Unknown tool: {name}"))),
        };

        match result {
            Ok(tool_result) => JsonRpcResponse::success(
                request.id.clone(),
                serde_json::to_value(tool_result).unwrap_or_default(),
            ),
            Err(e) => JsonRpcResponse::success(
                request.id.clone(),
                serde_json::to_value(ToolResult::error(format!("Error: {e}"))).unwrap_or_default(),
            ),
        }
    }
}

pub async fn start_server(indexer: Indexer) -> Result<()> {
    let server = McpServer::new(indexer);
    server.run().await
}
