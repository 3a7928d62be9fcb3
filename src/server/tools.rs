use std::sync::Arc;

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::tenor::{Image, TenorError, TenorManager, SEARCH_LIMIT_RANGE};

use super::rpc::{RpcRequest, RpcResponse, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST};

pub const SERVER_NAME: &str = "Tenor API";
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";
const DEFAULT_SEARCH_LIMIT: i64 = 10;

#[derive(Debug, Serialize, PartialEq)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub _type: &'static str,
    pub text: String,
}

impl TextContent {
    pub fn new(text: String) -> Self {
        Self {
            _type: "text",
            text,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ToolResult {
    pub content: Vec<TextContent>,
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    fn success(content: Vec<TextContent>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    fn failure(err: &TenorError) -> Self {
        Self {
            content: vec![TextContent::new(err.to_string())],
            is_error: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SearchArguments {
    #[serde(rename = "searchTerm")]
    search_term: String,
    /// any json number, `5.0` is as much an integer as `5`
    #[serde(default = "default_limit")]
    limit: f64,
}

fn default_limit() -> f64 {
    DEFAULT_SEARCH_LIMIT as f64
}

pub fn format_image(image: &Image) -> TextContent {
    TextContent::new(format!(
        "url: {}\ndescription: {}\ntags: {}",
        image.url,
        image.description,
        image.tags.join(", ")
    ))
}

pub fn tool_definitions() -> Value {
    json!([
        {
            "name": "search",
            "description": "Search for GIFs",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "searchTerm": {
                        "type": "string",
                        "minLength": 1,
                        "description": "The search term to find GIFs"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": *SEARCH_LIMIT_RANGE.start(),
                        "maximum": *SEARCH_LIMIT_RANGE.end(),
                        "default": DEFAULT_SEARCH_LIMIT,
                        "description": "Maximum number of results to return"
                    }
                },
                "required": ["searchTerm"]
            }
        },
        {
            "name": "categories",
            "description": "Get Tenor categories",
            "inputSchema": { "type": "object", "properties": {} }
        },
        {
            "name": "trending",
            "description": "Get Tenor trending GIFs",
            "inputSchema": { "type": "object", "properties": {} }
        }
    ])
}

/// Maps protocol messages onto [`TenorManager`] calls
pub struct ToolServer {
    manager: Arc<TenorManager>,
}

impl ToolServer {
    pub fn new(manager: Arc<TenorManager>) -> Self {
        Self { manager }
    }

    /// `None` when the message was a notification
    pub async fn handle(&self, request: RpcRequest) -> Option<RpcResponse> {
        debug!("Received {} request", request.method);
        let id = match request.id {
            Some(id) => id,
            None => {
                debug!("Ignoring notification {}", request.method);
                return None;
            }
        };
        let id = Some(id);
        if request.jsonrpc != "2.0" {
            return Some(RpcResponse::error(
                id,
                INVALID_REQUEST,
                "Unsupported jsonrpc version (expected 2.0)",
            ));
        }
        let response = match request.method.as_str() {
            "initialize" => initialize(id, request.params.as_ref()),
            "ping" => RpcResponse::success(id, json!({})),
            "tools/list" => RpcResponse::success(id, json!({ "tools": tool_definitions() })),
            "tools/call" => self.call_tool(id, request.params).await,
            other => {
                warn!("Unknown method {}", other);
                RpcResponse::method_not_found(id, other)
            }
        };
        Some(response)
    }

    async fn call_tool(&self, id: Option<Value>, params: Option<Value>) -> RpcResponse {
        let call = match params.map(serde_json::from_value::<ToolCall>) {
            Some(Ok(call)) => call,
            _ => {
                return RpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    "params must be an object with a tool name",
                )
            }
        };
        let outcome: Result<Vec<TextContent>, TenorError> = match call.name.as_str() {
            "search" => {
                let (term, limit) = match search_arguments(call.arguments) {
                    Ok(args) => args,
                    Err(message) => return RpcResponse::error(id, INVALID_PARAMS, message),
                };
                self.manager
                    .search(&term, limit)
                    .await
                    .map(|result| result.images.iter().map(format_image).collect())
            }
            "trending" => self
                .manager
                .trending()
                .await
                .map(|result| result.images.iter().map(format_image).collect()),
            "categories" => self.manager.categories().await.map(|categories| {
                let names = categories
                    .iter()
                    .map(|category| category.name.as_str())
                    .collect::<Vec<_>>();
                vec![TextContent::new(names.join(", "))]
            }),
            other => {
                return RpcResponse::error(id, INVALID_PARAMS, format!("Unknown tool '{}'", other))
            }
        };
        let result = match outcome {
            Ok(content) => ToolResult::success(content),
            Err(err) => {
                error!("Tool {} failed: {}", call.name, err);
                ToolResult::failure(&err)
            }
        };
        match serde_json::to_value(&result) {
            Ok(value) => RpcResponse::success(id, value),
            Err(err) => RpcResponse::error(id, INTERNAL_ERROR, err.to_string()),
        }
    }
}

fn initialize(id: Option<Value>, params: Option<&Value>) -> RpcResponse {
    let version = params
        .and_then(|params| params.get("protocolVersion"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);
    RpcResponse::success(
        id,
        json!({
            "protocolVersion": version,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            }
        }),
    )
}

fn search_arguments(arguments: Option<Value>) -> Result<(String, u32), String> {
    let args = serde_json::from_value::<SearchArguments>(arguments.unwrap_or(Value::Null))
        .map_err(|err| format!("Invalid search arguments: {}", err))?;
    if args.search_term.trim().is_empty() {
        return Err("searchTerm must contain at least 1 non-whitespace character".to_owned());
    }
    let (min, max) = (*SEARCH_LIMIT_RANGE.start(), *SEARCH_LIMIT_RANGE.end());
    let in_range = (f64::from(min)..=f64::from(max)).contains(&args.limit);
    if args.limit.fract() != 0.0 || !in_range {
        return Err(format!(
            "limit must be an integer between {} and {}, got {}",
            min, max, args.limit
        ));
    }
    Ok((args.search_term, args.limit as u32))
}
