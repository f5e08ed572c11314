//! Call proxying - local invocations forwarded as correlated requests
//!
//! The invoke path validates arguments before anything is sent, registers
//! a pending call, and suspends the caller until exactly one of: the
//! matching response arrives, the deadline elapses, or the session dies.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{self, error_codes, ContentBlock, Request, ToolCallResult};
use crate::schema;
use crate::session::SessionInner;

/// Decoded output of a successful tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Content blocks as returned by the provider
    pub content: Vec<ContentBlock>,
}

impl ToolOutput {
    /// Flatten the content blocks into one text string
    pub fn text(&self) -> String {
        let mut output = String::new();
        for block in &self.content {
            match block {
                ContentBlock::Text { text } => {
                    output.push_str(text);
                    output.push('\n');
                }
                ContentBlock::Image { mime_type, .. } => {
                    let _ = writeln!(output, "[image: {mime_type}]");
                }
                ContentBlock::Resource { uri, text, .. } => match text {
                    Some(text) => {
                        output.push_str(text);
                        output.push('\n');
                    }
                    None => {
                        let _ = writeln!(output, "[resource: {uri}]");
                    }
                },
            }
        }
        output.trim_end().to_string()
    }
}

/// Forward one tool invocation over the session and await its outcome
pub(crate) async fn invoke(
    inner: &Arc<SessionInner>,
    tool: &str,
    arguments: Value,
) -> Result<ToolOutput> {
    inner.ensure_ready().await?;

    // Resolve the descriptor; nothing is sent for an unknown tool.
    let registry = Arc::clone(&*inner.registry.read().await);
    let descriptor = registry
        .get(tool)
        .ok_or_else(|| Error::UnknownTool(tool.to_string()))?;

    // Validate before send; a mismatch costs no wire traffic.
    schema::validate(&descriptor.input_schema, &arguments).map_err(|reason| {
        Error::ArgumentValidation {
            tool: tool.to_string(),
            reason,
        }
    })?;

    let id = inner.next_correlation_id();
    let response = inner.register_call(id).await?;
    let frame = protocol::encode_frame(&Request::call_tool(id, tool, arguments))?;

    debug!(id, tool, "sending tool call");
    if let Err(e) = inner.send_frame(frame).await {
        inner.discard_pending(id).await;
        return Err(e);
    }

    let timeout = inner.config.call_timeout;
    let payload = match tokio::time::timeout(timeout, response).await {
        Err(_) => {
            // Discarding the slot guarantees a late response for this id
            // resolves nothing.
            inner.discard_pending(id).await;
            debug!(id, tool, "call deadline elapsed");
            return Err(Error::CallTimeout(timeout));
        }
        Ok(Err(_)) => return Err(Error::SessionLost("session task stopped".to_string())),
        Ok(Ok(Err(e))) => return Err(e),
        Ok(Ok(Ok(payload))) => payload,
    };

    let result: ToolCallResult = serde_json::from_value(payload)
        .map_err(|e| Error::MalformedMessage(format!("invalid tools/call result: {e}")))?;

    if result.is_error {
        // The tool ran and reported failure in-band; surface it the same
        // way as a provider error object so callers see one taxonomy.
        let output = ToolOutput { content: result.content };
        return Err(Error::Remote {
            code: error_codes::TOOL_EXECUTION_ERROR,
            message: output.text(),
            data: None,
        });
    }

    debug!(id, tool, "tool call resolved");
    Ok(ToolOutput { content: result.content })
}
