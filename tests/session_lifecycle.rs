//! Session state machine: handshake outcomes, close semantics, transport loss.

mod common;

use std::time::Duration;

use mcp_bridge::{Error, Session, SessionState, TransportHandle};
use serde_json::json;

use common::{config, parse, ready_session};

#[tokio::test]
async fn handshake_reaches_ready_and_captures_server_info() {
    let (session, _provider) = ready_session(config()).await;
    assert_eq!(session.state().await, SessionState::Ready);
    assert_eq!(session.server_info().name, "fake-provider");
    assert_eq!(session.server_info().version.as_deref(), Some("1.0.0"));
    session.close().await;
}

#[tokio::test]
async fn silent_provider_times_out_the_handshake() {
    let (transport, mut provider) = TransportHandle::duplex(32);
    // Swallow the initialize request, never answer, stay connected.
    let hold = tokio::spawn(async move {
        let _ = provider.recv().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(provider);
    });

    let config = config().with_handshake_timeout(Duration::from_millis(100));
    let err = Session::connect(transport, config).await.expect_err("must time out");
    assert!(matches!(err, Error::HandshakeTimeout(_)), "got {err:?}");
    hold.abort();
}

#[tokio::test]
async fn unsupported_protocol_version_is_incompatible() {
    let (transport, mut provider) = TransportHandle::duplex(32);
    let server = tokio::spawn(async move {
        let frame = provider.recv().await.expect("initialize");
        let id = parse(&frame)["id"].as_u64().expect("id");
        let ack = json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "protocolVersion": "1999-01-01",
                "capabilities": {},
                "serverInfo": { "name": "old-provider" }
            }
        });
        assert!(provider.send(ack.to_string()).await);
        provider
    });

    let err = Session::connect(transport, config()).await.expect_err("must reject");
    assert!(matches!(err, Error::IncompatibleHandshake(_)), "got {err:?}");
    drop(server);
}

#[tokio::test]
async fn provider_error_on_initialize_is_incompatible() {
    let (transport, mut provider) = TransportHandle::duplex(32);
    let server = tokio::spawn(async move {
        let frame = provider.recv().await.expect("initialize");
        let id = parse(&frame)["id"].as_u64().expect("id");
        let nack = common::error_response(id, -32600, "unsupported client");
        assert!(provider.send(nack).await);
        provider
    });

    let err = Session::connect(transport, config()).await.expect_err("must reject");
    assert!(matches!(err, Error::IncompatibleHandshake(_)), "got {err:?}");
    drop(server);
}

#[tokio::test]
async fn malformed_message_during_handshake_is_fatal() {
    let (transport, mut provider) = TransportHandle::duplex(32);
    let server = tokio::spawn(async move {
        let _ = provider.recv().await.expect("initialize");
        assert!(provider.send("this is not json").await);
        provider
    });

    let err = Session::connect(transport, config()).await.expect_err("must fail");
    assert!(matches!(err, Error::MalformedMessage(_)), "got {err:?}");
    drop(server);
}

#[tokio::test]
async fn transport_loss_during_handshake_is_session_lost() {
    let (transport, provider) = TransportHandle::duplex(32);
    drop(provider);

    let err = Session::connect(transport, config()).await.expect_err("must fail");
    assert!(
        matches!(err, Error::SessionLost(_) | Error::MalformedMessage(_)),
        "got {err:?}"
    );
}

#[tokio::test]
async fn close_is_terminal_and_idempotent() {
    let (session, _provider) = ready_session(config()).await;
    session.close().await;
    assert_eq!(session.state().await, SessionState::Closed);

    let err = session.invoke("anything", json!({})).await.expect_err("closed");
    assert!(matches!(err, Error::SessionClosed), "got {err:?}");
    let err = session.discover().await.expect_err("closed");
    assert!(matches!(err, Error::SessionClosed), "got {err:?}");

    // A second close is a no-op, not a panic or state change.
    session.close().await;
    assert_eq!(session.state().await, SessionState::Closed);
}

#[tokio::test]
async fn transport_loss_after_ready_errors_the_session() {
    let (session, provider) = ready_session(config()).await;
    assert_eq!(session.state().await, SessionState::Ready);

    drop(provider);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(session.state().await, SessionState::Errored);
    let err = session.invoke("anything", json!({})).await.expect_err("lost");
    assert!(matches!(err, Error::SessionLost(_)), "got {err:?}");
}

#[tokio::test]
async fn malformed_message_after_ready_is_non_fatal() {
    let (session, provider) = ready_session(config()).await;

    assert!(provider.send("garbage that is not a frame").await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The session shrugs it off and stays usable.
    assert_eq!(session.state().await, SessionState::Ready);
    session.close().await;
}

#[tokio::test]
async fn notifications_are_discarded_without_breaking_calls() {
    let (session, provider) = ready_session(config()).await;

    let note = json!({"jsonrpc": "2.0", "method": "notifications/tools/list_changed"});
    assert!(provider.send(note.to_string()).await);
    let note = json!({"jsonrpc": "2.0", "method": "notifications/progress", "params": {"p": 1}});
    assert!(provider.send(note.to_string()).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(session.state().await, SessionState::Ready);
    session.close().await;
}
