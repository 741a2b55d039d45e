//! Newline-delimited JSON-RPC 2.0 tool server over stdio.
//!
//! Exposes two tools, `search` and `download`, through `tools/list` and
//! `tools/call`. Requests without an `id` are notifications and never get a
//! response. Log output goes to stderr so stdout carries only responses.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use bookcourier_core::delivery::{Courier, DeliveryOutcome, DeliveryRequest, deliver_with_fallback};
use bookcourier_core::{BookRecord, SearchClient};

const JSONRPC_VERSION: &str = "2.0";
const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "bookcourier";

/// Maximum number of records returned by the `search` tool.
pub(crate) const MAX_SEARCH_RESULTS: usize = 30;

/// Format preferred by the `search` tool when the caller names none.
pub(crate) const DEFAULT_PREFERRED_FORMAT: &str = "epub";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const TOOL_ERROR: i64 = -32000;

const SEARCH_TOOL_DESCRIPTION: &str = "Search the book archive. Returns records with title, authors, format, language, size and hash. Records in the preferred format (epub by default) come first. Pass a hash from the results to `download`.";
const DOWNLOAD_TOOL_DESCRIPTION: &str = "Download a book by hash and email it to an e-reader inbox (kindle_email, or the configured KINDLE_EMAIL). A local backup is kept when ARCHIVE_DOWNLOAD_PATH is set. Falls back to a local save when email is not configured, the file is too large, or the SMTP connection fails. MOBI files are usually rejected by e-reader email ingestion.";

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct SearchArguments {
    #[serde(default, alias = "query")]
    term: String,
    #[serde(default)]
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DownloadArguments {
    hash: String,
    title: String,
    format: String,
    #[serde(default)]
    kindle_email: Option<String>,
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }
}

/// Dispatches JSON-RPC requests to the search client and courier.
#[derive(Debug, Clone)]
pub(crate) struct ToolServer {
    search: SearchClient,
    courier: Courier,
}

impl ToolServer {
    pub(crate) fn new(search: SearchClient, courier: Courier) -> Self {
        Self { search, courier }
    }

    /// Reads requests line by line until EOF, writing one response line per request.
    pub(crate) async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(name = SERVER_NAME, version = env!("CARGO_PKG_VERSION"), "tool server started");
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await.context("Failed to read request line")? {
            if line.trim().is_empty() {
                continue;
            }
            let Some(response) = self.handle_line(&line).await else {
                continue;
            };
            let mut encoded =
                serde_json::to_vec(&response).context("Failed to encode JSON-RPC response")?;
            encoded.push(b'\n');
            writer
                .write_all(&encoded)
                .await
                .context("Failed to write JSON-RPC response")?;
            writer.flush().await.context("Failed to flush JSON-RPC response")?;
        }
        info!("tool server input closed");
        Ok(())
    }

    /// Handles one request line. Returns `None` for notifications.
    pub(crate) async fn handle_line(&self, line: &str) -> Option<Value> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(error) => {
                warn!(error = %error, "unparsable JSON-RPC line");
                return Some(error_response(
                    &Value::Null,
                    &RpcError::new(PARSE_ERROR, format!("Parse error: {error}")),
                ));
            }
        };
        let id = raw.get("id").cloned().filter(|id| !id.is_null());

        let request: RpcRequest = match serde_json::from_value(raw) {
            Ok(request) => request,
            Err(error) => {
                let id = id?;
                return Some(error_response(
                    &id,
                    &RpcError::new(INVALID_REQUEST, format!("Invalid request: {error}")),
                ));
            }
        };
        if request
            .jsonrpc
            .as_deref()
            .is_some_and(|version| version != JSONRPC_VERSION)
        {
            let id = id?;
            return Some(error_response(
                &id,
                &RpcError::new(INVALID_REQUEST, "Invalid request: jsonrpc must be \"2.0\""),
            ));
        }

        debug!(method = %request.method, id = ?request.id, "handling request");
        let outcome = self.dispatch(&request.method, request.params).await;

        let id = request.id.filter(|id| !id.is_null())?;
        Some(match outcome {
            Ok(result) => json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "result": result }),
            Err(error) => error_response(&id, &error),
        })
    }

    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(initialize_result(&params)),
            "ping" => Ok(json!({})),
            "notifications/initialized" => Ok(Value::Null),
            "tools/list" => Ok(json!({ "tools": tool_definitions() })),
            "tools/call" => {
                let call: ToolCall = serde_json::from_value(params)
                    .map_err(|e| RpcError::invalid_params(format!("Invalid tool call: {e}")))?;
                self.call_tool(call).await
            }
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        }
    }

    async fn call_tool(&self, call: ToolCall) -> Result<Value, RpcError> {
        match call.name.as_str() {
            "search" => {
                let args: SearchArguments = serde_json::from_value(call.arguments)
                    .map_err(|e| RpcError::invalid_params(format!("Invalid search arguments: {e}")))?;
                self.search_tool(args).await
            }
            "download" => {
                let args: DownloadArguments = serde_json::from_value(call.arguments).map_err(|e| {
                    RpcError::invalid_params(format!("Invalid download arguments: {e}"))
                })?;
                self.download_tool(args).await
            }
            other => Err(RpcError::invalid_params(format!("Unknown tool: {other}"))),
        }
    }

    async fn search_tool(&self, args: SearchArguments) -> Result<Value, RpcError> {
        let term = args.term.trim();
        if term.is_empty() {
            return Err(RpcError::invalid_params("search requires a non-empty `term`"));
        }
        let preferred = args
            .format
            .as_deref()
            .map(str::trim)
            .filter(|format| !format.is_empty())
            .unwrap_or(DEFAULT_PREFERRED_FORMAT);

        let mut records = self
            .search
            .search_with_format(term, preferred)
            .await
            .map_err(|e| {
                error!(term, error = %e, "search tool failed");
                RpcError::new(TOOL_ERROR, e.to_string())
            })?;
        let found = records.len();
        records.truncate(MAX_SEARCH_RESULTS);
        info!(term, preferred, found, returned = records.len(), "search tool completed");

        Ok(json!({
            "content": [{ "type": "text", "text": search_text(&records) }],
            "structuredContent": { "items": records },
        }))
    }

    async fn download_tool(&self, args: DownloadArguments) -> Result<Value, RpcError> {
        if args.hash.trim().is_empty() {
            return Err(RpcError::invalid_params("download requires a non-empty `hash`"));
        }
        let mut request = DeliveryRequest::new(args.hash.trim(), args.title, args.format);
        if let Some(target) = args.kindle_email {
            request = request.with_target(target);
        }

        let result = deliver_with_fallback(&self.courier, &request)
            .await
            .map_err(|e| {
                error!(hash = %request.hash, error = %e, "download tool failed");
                RpcError::new(TOOL_ERROR, e.to_string())
            })?;

        let text = match (&result.outcome, &result.fallback_reason) {
            (DeliveryOutcome::SavedLocally { path, .. }, Some(reason)) => format!(
                "Book downloaded successfully to path: {}\n\n{reason}\n\nThe file was saved locally instead of being emailed.",
                path.display()
            ),
            (DeliveryOutcome::SkippedDuplicate, _) => "Download skipped - this book was recently sent to this address. Please wait a moment before trying again.".to_string(),
            (outcome, _) => outcome.to_string(),
        };
        Ok(json!({ "content": [{ "type": "text", "text": text }] }))
    }
}

fn search_text(records: &[BookRecord]) -> String {
    if records.is_empty() {
        return "No books found for your search term.".to_string();
    }
    records
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn initialize_result(params: &Value) -> Value {
    let protocol_version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);
    json!({
        "protocolVersion": protocol_version,
        "capabilities": { "tools": {} },
        "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
    })
}

fn tool_definitions() -> Value {
    json!([
        {
            "name": "search",
            "description": SEARCH_TOOL_DESCRIPTION,
            "inputSchema": {
                "type": "object",
                "properties": {
                    "term": { "type": "string", "description": "Title, author or keywords" },
                    "format": { "type": "string", "description": "Preferred format (epub, pdf, mobi); defaults to epub" },
                },
                "required": ["term"],
            },
        },
        {
            "name": "download",
            "description": DOWNLOAD_TOOL_DESCRIPTION,
            "inputSchema": {
                "type": "object",
                "properties": {
                    "hash": { "type": "string", "description": "Record hash from the search results" },
                    "title": { "type": "string", "description": "Book title, used for the filename and subject" },
                    "format": { "type": "string", "description": "Declared format; the real format is detected from the file" },
                    "kindle_email": { "type": "string", "description": "Destination inbox; defaults to KINDLE_EMAIL" },
                },
                "required": ["hash", "title", "format"],
            },
        },
    ])
}

fn error_response(id: &Value, error: &RpcError) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": { "code": error.code, "message": error.message },
    })
}
