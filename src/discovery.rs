//! Capability discovery - populate the tool registry from the provider

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::{self, Request, ToolsListResult};
use crate::registry::ToolRegistry;
use crate::schema;
use crate::session::SessionInner;

/// Send a single tools/list request and rebuild the session's registry
/// from the response, in provider order, with the allow-list applied.
pub(crate) async fn discover(inner: &Arc<SessionInner>) -> Result<Arc<ToolRegistry>> {
    inner.ensure_ready().await?;

    let id = inner.next_correlation_id();
    let response = inner.register_call(id).await?;
    if let Err(e) = inner
        .send_frame(protocol::encode_frame(&Request::list_tools(id))?)
        .await
    {
        inner.discard_pending(id).await;
        return Err(e);
    }

    let timeout = inner.config.call_timeout;
    let payload = match tokio::time::timeout(timeout, response).await {
        Err(_) => {
            inner.discard_pending(id).await;
            return Err(Error::DiscoveryTimeout(timeout));
        }
        Ok(Err(_)) => return Err(Error::SessionLost("session task stopped".to_string())),
        Ok(Ok(Err(e))) => return Err(e),
        Ok(Ok(Ok(payload))) => payload,
    };

    let listed: ToolsListResult = serde_json::from_value(payload)
        .map_err(|e| Error::MalformedMessage(format!("invalid tools/list result: {e}")))?;
    debug!(declared = listed.tools.len(), "provider declared tools");

    let descriptors = listed.tools.iter().map(schema::adapt).collect();
    let registry = Arc::new(ToolRegistry::build(
        descriptors,
        inner.config.allowed_tools.as_deref(),
    ));

    *inner.registry.write().await = Arc::clone(&registry);
    info!(tools = registry.len(), "tool registry built");

    Ok(registry)
}
