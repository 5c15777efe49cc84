// MCP server implementation

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::mcp::{tools, McpContext};

const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;

/// JSON-RPC message
#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcMessage {
    jsonrpc: String,
    id: Option<Value>,
    method: Option<String>,
    params: Option<Value>,
}

/// MCP tool definition
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ServerCapabilities {
    tools: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ServerInfo {
    name: String,
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResult {
    protocol_version: String,
    capabilities: ServerCapabilities,
    server_info: ServerInfo,
}

/// MCP server
pub struct McpServer {
    ctx: McpContext,
}

impl McpServer {
    pub fn new(ctx: McpContext) -> Self {
        Self { ctx }
    }

    /// Serve requests from stdin until it closes. Responses go to stdout,
    /// one per line; logs must stay on stderr.
    pub async fn run(self) -> Result<()> {
        info!("Starting MCP server");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            debug!("Received: {}", line);

            let response = match self.handle_message(&line).await {
                Ok(Some(response)) => response,
                Ok(None) => continue,
                Err(e) => {
                    error!("Error handling message: {}", e);
                    serde_json::to_string(&fail(Value::Null, PARSE_ERROR, &format!("Parse error: {}", e)))?
                }
            };
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", response)?;
            stdout.flush()?;
        }

        info!("stdin closed, MCP server exiting");
        Ok(())
    }

    /// Handle a JSON-RPC message. Notifications get no response.
    pub async fn handle_message(&self, message: &str) -> Result<Option<String>> {
        let msg: JsonRpcMessage = serde_json::from_str(message)?;
        let id = msg.id.unwrap_or(Value::Null);

        let response = match msg.method.as_deref() {
            Some("initialize") => {
                let result = InitializeResult {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                    capabilities: ServerCapabilities {
                        tools: Some(json!({})),
                    },
                    server_info: ServerInfo {
                        name: "codeindex".to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                };
                reply(id, serde_json::to_value(result)?)
            }
            Some(method) if method.starts_with("notifications/") => {
                debug!("Notification: {}", method);
                return Ok(None);
            }
            Some("ping") => reply(id, json!({})),
            Some("tools/list") => reply(id, json!({ "tools": list_tools() })),
            Some("tools/call") => match &msg.params {
                Some(params) => match self.call_tool(params).await {
                    Ok(result) => reply(id, result),
                    Err(e) => {
                        warn!("Tool call failed: {:#}", e);
                        let body = json!({
                            "content": [{ "type": "text", "text": format!("Error: {:#}", e) }],
                            "isError": true
                        });
                        reply(id, body)
                    }
                },
                None => fail(id, INVALID_PARAMS, "Invalid params"),
            },
            Some("shutdown") => {
                info!("Received shutdown request");
                reply(id, Value::Null)
            }
            _ => fail(id, METHOD_NOT_FOUND, "Method not found"),
        };

        Ok(Some(serde_json::to_string(&response)?))
    }

    async fn call_tool(&self, params: &Value) -> Result<Value> {
        let tool_name = params["name"].as_str().ok_or_else(|| anyhow!("Missing tool name"))?;
        let empty = serde_json::Map::new();
        let args = match params.get("arguments") {
            None | Some(Value::Null) => &empty,
            Some(value) => value.as_object().ok_or_else(|| anyhow!("Invalid arguments"))?,
        };
        debug!("Tool call: {}", tool_name);

        match tool_name {
            "codeindex_query" => tools::query(&self.ctx, args),
            "codeindex_impact" => tools::impact(&self.ctx, args),
            "codeindex_coupling" => tools::coupling(&self.ctx, args),
            "codeindex_stats" => tools::stats(&self.ctx, args),
            "codeindex_update" => tools::update(&self.ctx, args).await,
            "codeindex_check" => tools::check(&self.ctx, args).await,
            _ => Err(anyhow!("Unknown tool: {}", tool_name)),
        }
    }
}

fn reply(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn fail(id: Value, code: i32, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}

fn format_property() -> Value {
    json!({
        "type": "string",
        "enum": ["text", "json"],
        "default": "text",
        "description": "Output format"
    })
}

fn list_tools() -> Vec<Tool> {
    vec![
        Tool {
            name: "codeindex_query".to_string(),
            description: "Find the callers, callees or covering tests of a symbol".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query_type": {
                        "type": "string",
                        "enum": ["callers", "callees", "tests"],
                        "description": "Type of query to perform"
                    },
                    "target": {
                        "type": "string",
                        "description": "Symbol key (file:qualified.name), qualified name or bare name"
                    },
                    "format": format_property()
                },
                "required": ["query_type", "target"]
            }),
        },
        Tool {
            name: "codeindex_impact".to_string(),
            description: "Callers, tests and endpoints affected by changing a file".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file": {
                        "type": "string",
                        "description": "Path relative to the project root"
                    },
                    "format": format_property()
                },
                "required": ["file"]
            }),
        },
        Tool {
            name: "codeindex_coupling".to_string(),
            description: "Files most likely to change together with a file".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file": {
                        "type": "string",
                        "description": "Path relative to the project root"
                    },
                    "limit": {
                        "type": "integer",
                        "default": 5,
                        "description": "Maximum number of partners"
                    },
                    "format": format_property()
                },
                "required": ["file"]
            }),
        },
        Tool {
            name: "codeindex_stats".to_string(),
            description: "Get index statistics".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "format": format_property()
                }
            }),
        },
        Tool {
            name: "codeindex_update".to_string(),
            description: "Re-index changed files and save the index".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "rebuild": {
                        "type": "boolean",
                        "default": false,
                        "description": "Rebuild from scratch instead of updating"
                    }
                }
            }),
        },
        Tool {
            name: "codeindex_check".to_string(),
            description: "Report whether the index is behind the working tree".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "git": {
                        "type": "boolean",
                        "default": false,
                        "description": "Use git history instead of re-hashing files"
                    },
                    "format": format_property()
                }
            }),
        },
    ]
}
