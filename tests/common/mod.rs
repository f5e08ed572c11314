//! Shared helpers: an in-memory fake provider driven from the test side.
#![allow(dead_code)]

use std::time::Duration;

use mcp_bridge::{BridgeConfig, ProviderEnd, Session, TransportHandle};
use serde_json::{json, Value};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Config with short timeouts; the transport section is unused because
/// tests connect through an in-memory duplex.
pub fn config() -> BridgeConfig {
    BridgeConfig::stdio("in-memory")
        .with_call_timeout(Duration::from_millis(500))
        .with_handshake_timeout(Duration::from_millis(500))
}

pub fn parse(frame: &str) -> Value {
    serde_json::from_str(frame.trim()).expect("valid json frame")
}

pub fn init_result(id: u64) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": true } },
            "serverInfo": { "name": "fake-provider", "version": "1.0.0" }
        }
    })
    .to_string()
}

pub fn response(id: u64, result: Value) -> String {
    json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string()
}

pub fn error_response(id: u64, code: i64, message: &str) -> String {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}}).to_string()
}

pub fn text_result(text: &str) -> Value {
    json!({"content": [{"type": "text", "text": text}], "isError": false})
}

/// Declaration of an echo-style tool: one required string argument `text`.
pub fn tool_decl(name: &str) -> Value {
    json!({
        "name": name,
        "description": format!("The {name} tool"),
        "inputSchema": {
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        }
    })
}

/// Drive the handshake from the provider side.
pub async fn serve_handshake(provider: &mut ProviderEnd) {
    let frame = provider.recv().await.expect("initialize request");
    let request = parse(&frame);
    assert_eq!(request["method"], "initialize");
    assert_eq!(request["params"]["protocolVersion"], PROTOCOL_VERSION);
    let id = request["id"].as_u64().expect("numeric id");
    assert!(provider.send(init_result(id)).await);

    let frame = provider.recv().await.expect("initialized notification");
    assert_eq!(parse(&frame)["method"], "notifications/initialized");
}

/// Open a ready session backed by an in-memory provider.
pub async fn ready_session(config: BridgeConfig) -> (Session, ProviderEnd) {
    let (transport, mut provider) = TransportHandle::duplex(32);
    let server = tokio::spawn(async move {
        serve_handshake(&mut provider).await;
        provider
    });
    let session = Session::connect(transport, config).await.expect("handshake");
    let provider = server.await.expect("provider task");
    (session, provider)
}

/// Answer the next tools/list request with the given declarations.
pub async fn serve_tools_list(provider: &mut ProviderEnd, tools: Value) {
    let frame = provider.recv().await.expect("tools/list request");
    let request = parse(&frame);
    assert_eq!(request["method"], "tools/list");
    let id = request["id"].as_u64().expect("numeric id");
    assert!(provider.send(response(id, json!({ "tools": tools }))).await);
}

/// Ready session with the given tools already discovered.
pub async fn session_with_tools(config: BridgeConfig, tools: Value) -> (Session, ProviderEnd) {
    let (session, mut provider) = ready_session(config).await;
    let server = tokio::spawn(async move {
        serve_tools_list(&mut provider, tools).await;
        provider
    });
    session.discover().await.expect("discover");
    let provider = server.await.expect("provider task");
    (session, provider)
}

/// Answer the next tools/call request by echoing `params.arguments.text`.
pub async fn serve_echo_call(provider: &mut ProviderEnd) {
    let frame = provider.recv().await.expect("tools/call request");
    let request = parse(&frame);
    assert_eq!(request["method"], "tools/call");
    let id = request["id"].as_u64().expect("numeric id");
    let text = request["params"]["arguments"]["text"]
        .as_str()
        .expect("text argument")
        .to_string();
    assert!(provider.send(response(id, text_result(&text))).await);
}
