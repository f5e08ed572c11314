//! Streaming HTTP transport
//!
//! Connects to a remote provider behind a persistent streaming endpoint:
//! inbound messages arrive as `data:` events on a server-sent-events
//! stream opened at connect time, and outbound messages are POSTed to the
//! same endpoint as JSON. Opening the event stream doubles as the connect
//! probe; 401/403 there is an authentication rejection, anything else
//! non-successful means the endpoint is unreachable.

use std::collections::HashMap;

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use url::Url;

use super::{TransportHandle, CHANNEL_CAPACITY};
use crate::error::{Error, Result};

pub(super) async fn open(
    endpoint: &str,
    headers: &HashMap<String, String>,
) -> Result<TransportHandle> {
    let url = Url::parse(endpoint)
        .map_err(|e| Error::Unreachable(format!("invalid endpoint '{endpoint}': {e}")))?;

    let mut header_map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| Error::Unreachable(format!("invalid header name '{key}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Unreachable(format!("invalid value for header '{key}': {e}")))?;
        header_map.insert(name, value);
    }

    let client = reqwest::Client::builder()
        .default_headers(header_map)
        .build()
        .map_err(|e| Error::Unreachable(e.to_string()))?;

    debug!(%url, "opening provider event stream");
    let response = client
        .get(url.clone())
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|e| Error::Unreachable(format!("{url}: {e}")))?;

    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(Error::AuthRejected(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        status if !status.is_success() => {
            return Err(Error::Unreachable(format!("{url} returned {status}")));
        }
        _ => {}
    }

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    // Inbound task: parse SSE events off the byte stream until the
    // connection drops or the session shuts down.
    tokio::spawn(async move {
        let pump = async {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();
            // data: lines accumulate until the blank-line event separator;
            // one event may span several of them.
            let mut event_data: Vec<String> = Vec::new();
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!("provider event stream failed: {e}");
                        break;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim_end_matches('\r').to_string();
                    buffer.drain(..=newline);
                    if line.is_empty() {
                        if !event_data.is_empty() {
                            let frame = event_data.join("\n");
                            event_data.clear();
                            if inbound_tx.send(frame).await.is_err() {
                                return;
                            }
                        }
                    } else if let Some(data) = line.strip_prefix("data:") {
                        // one leading space after the colon is part of the
                        // field syntax, not the payload
                        event_data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
                    }
                    // event names and comments are ignored
                }
            }
        };
        tokio::select! {
            _ = &mut shutdown_rx => debug!("provider event stream closed on shutdown"),
            () = pump => debug!("provider event stream ended"),
        }
    });

    // Outbound task: sole sender, POSTs each frame in order.
    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let post = client
                .post(url.clone())
                .header(CONTENT_TYPE, "application/json")
                .body(frame)
                .send()
                .await;
            match post {
                Ok(response) if !response.status().is_success() => {
                    warn!(status = %response.status(), "provider rejected outbound message");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("failed to post message to provider: {e}");
                    break;
                }
            }
        }
    });

    Ok(TransportHandle::from_parts(
        outbound_tx,
        inbound_rx,
        Some(shutdown_tx),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn unauthorized_endpoint_is_auth_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = open(&server.uri(), &HashMap::new()).await;
        assert!(matches!(result, Err(Error::AuthRejected(_))));
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let result = open("http://127.0.0.1:1/mcp", &HashMap::new()).await;
        assert!(matches!(result, Err(Error::Unreachable(_))));
    }

    #[tokio::test]
    async fn invalid_url_is_unreachable() {
        let result = open("not a url", &HashMap::new()).await;
        assert!(matches!(result, Err(Error::Unreachable(_))));
    }

    #[tokio::test]
    async fn sse_data_lines_become_inbound_frames() {
        let server = MockServer::start().await;
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n";
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(body, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let handle = open(&server.uri(), &HashMap::new()).await.expect("open");
        let (_outbound, mut inbound, _shutdown) = handle.into_parts();
        let frame = inbound.recv().await.expect("one frame");
        assert!(frame.contains("\"id\":1"));
    }

    #[tokio::test]
    async fn split_data_lines_join_into_one_frame() {
        let server = MockServer::start().await;
        // One message split across two data: lines of a single event.
        let body = "data: {\"jsonrpc\":\"2.0\",\"id\":7,\ndata: \"result\":{}}\n\n";
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(body, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let handle = open(&server.uri(), &HashMap::new()).await.expect("open");
        let (_outbound, mut inbound, _shutdown) = handle.into_parts();
        let frame = inbound.recv().await.expect("one frame");
        let value: serde_json::Value =
            serde_json::from_str(&frame).expect("joined frame is valid json");
        assert_eq!(value["id"], 7);
    }
}
