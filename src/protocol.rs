//! Wire protocol types and message codec
//!
//! Messages are JSON-RPC 2.0 objects, one per newline-terminated frame,
//! following the Model Context Protocol specification. Three kinds travel
//! in either direction: requests (id + method + params), responses
//! (id + result-or-error), and notifications (method + params, no id).
//!
//! The codec is independent of transport kind: [`encode_frame`] produces a
//! single framed line and [`decode`] classifies one inbound frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// JSON-RPC version string
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision spoken by this bridge
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Protocol method names
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
}

/// Standard JSON-RPC error codes
pub mod error_codes {
    /// Parse error - invalid JSON
    pub const PARSE_ERROR: i64 = -32700;
    /// Invalid request object
    pub const INVALID_REQUEST: i64 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Tool executed but reported failure in-band
    pub const TOOL_EXECUTION_ERROR: i64 = -32000;
}

/// Correlated request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Create a new request
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Request {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }

    /// Create an initialize request
    pub fn initialize(id: u64) -> Self {
        Self::new(
            id,
            methods::INITIALIZE,
            Some(serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION")
                }
            })),
        )
    }

    /// Create a tools/list request
    pub fn list_tools(id: u64) -> Self {
        Self::new(id, methods::TOOLS_LIST, None)
    }

    /// Create a tools/call request
    pub fn call_tool(id: u64, name: impl Into<String>, arguments: Value) -> Self {
        Self::new(
            id,
            methods::TOOLS_CALL,
            Some(serde_json::json!({
                "name": name.into(),
                "arguments": arguments
            })),
        )
    }
}

/// Correlated response; `id` is null when the provider could not read ours
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// Unsolicited event, no correlation id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    /// Create a new notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Notification {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }

    /// Post-handshake acknowledgment notification
    pub fn initialized() -> Self {
        Self::new(methods::INITIALIZED, None)
    }
}

/// Provider-reported error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// One decoded inbound frame
#[derive(Debug, Clone)]
pub enum Inbound {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

/// Frame an outbound message as one newline-terminated line
pub fn encode_frame<T: Serialize>(message: &T) -> Result<String> {
    let mut line = serde_json::to_string(message)
        .map_err(|e| Error::MalformedMessage(format!("failed to encode message: {e}")))?;
    line.push('\n');
    Ok(line)
}

/// Parse one inbound frame into a request, response, or notification
pub fn decode(frame: &str) -> Result<Inbound> {
    let value: Value = serde_json::from_str(frame.trim())
        .map_err(|e| Error::MalformedMessage(format!("invalid JSON: {e}")))?;

    let Some(object) = value.as_object() else {
        return Err(Error::MalformedMessage("frame is not a JSON object".to_string()));
    };
    if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(Error::MalformedMessage(
            "missing or unsupported jsonrpc version".to_string(),
        ));
    }

    if object.contains_key("method") {
        if object.contains_key("id") {
            let request: Request = serde_json::from_value(value)
                .map_err(|e| Error::MalformedMessage(format!("invalid request: {e}")))?;
            Ok(Inbound::Request(request))
        } else {
            let notification: Notification = serde_json::from_value(value)
                .map_err(|e| Error::MalformedMessage(format!("invalid notification: {e}")))?;
            Ok(Inbound::Notification(notification))
        }
    } else if object.contains_key("result") || object.contains_key("error") {
        let response: Response = serde_json::from_value(value)
            .map_err(|e| Error::MalformedMessage(format!("invalid response: {e}")))?;
        Ok(Inbound::Response(response))
    } else {
        Err(Error::MalformedMessage(
            "frame is neither request, response, nor notification".to_string(),
        ))
    }
}

/// Remote tool declaration as received from the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteToolDef {
    /// Tool name
    pub name: String,
    /// Tool description
    #[serde(default)]
    pub description: Option<String>,
    /// Input parameter schema (JSON Schema)
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    /// Output schema, when the provider declares one
    #[serde(rename = "outputSchema", default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// Result of an initialize request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Protocol version the provider speaks
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Provider capabilities
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Provider identity
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// Provider capability flags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool capabilities
    #[serde(default)]
    pub tools: Option<ToolsCapability>,
}

/// Tool capability flags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsCapability {
    /// Whether the provider may emit tools/list_changed
    #[serde(default, rename = "listChanged")]
    pub list_changed: bool,
}

/// Provider identity from the handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Provider name
    pub name: String,
    /// Provider version
    #[serde(default)]
    pub version: Option<String>,
}

/// Result of a tools/list request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsListResult {
    /// Declared tools, in provider order
    pub tools: Vec<RemoteToolDef>,
}

/// Result of a tools/call request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Content items returned by the tool
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    /// Whether the tool reported failure in-band
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

/// Content item returned by a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Text content
    #[serde(rename = "text")]
    Text {
        /// The text content
        text: String,
    },
    /// Image content (base64 encoded)
    #[serde(rename = "image")]
    Image {
        /// Base64 encoded image data
        data: String,
        /// MIME type of the image
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Resource reference
    #[serde(rename = "resource")]
    Resource {
        /// Resource URI
        uri: String,
        /// Resource MIME type
        #[serde(rename = "mimeType", default)]
        mime_type: Option<String>,
        /// Optional inline text
        #[serde(default)]
        text: Option<String>,
    },
}
