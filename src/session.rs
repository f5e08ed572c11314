//! Session lifecycle
//!
//! One session is one live connection plus protocol state to a single
//! provider: the connection state machine, the handshake, the pending-call
//! map, and the router task that dispatches inbound messages by
//! correlation id. Multiple sessions to different providers never share
//! state; each owns its transport, registry, and pending map outright.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::discovery;
use crate::error::{Error, Result};
use crate::protocol::{self, Inbound, InitializeResult, Notification, Request, ServerInfo};
use crate::proxy::{self, ToolOutput};
use crate::registry::ToolRegistry;
use crate::transport::TransportHandle;

/// Connection state of a session
///
/// `Idle → Connecting → Handshaking → Ready → Closing → Closed`, with
/// `Errored` reachable from `Connecting`, `Handshaking`, or `Ready`. The
/// terminal pair is `(Closed, Errored)`; no state is re-entered once left,
/// and a dead session is never resurrected - open a new one to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Handshaking,
    Ready,
    Closing,
    Closed,
    Errored,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Handshaking => "handshaking",
            SessionState::Ready => "ready",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Outcome delivered into a pending call's result slot: the raw result
/// payload on success, a typed error otherwise. Exactly one is ever
/// delivered per call.
pub(crate) type CallOutcome = Result<Value>;

/// State shared between the session handle, the router task, and the
/// invoke/discover paths. The pending map and the state field are the only
/// mutable shared state, each behind its own lock.
pub(crate) struct SessionInner {
    pub(crate) config: BridgeConfig,
    pub(crate) state: RwLock<SessionState>,
    pub(crate) pending: Mutex<HashMap<u64, oneshot::Sender<CallOutcome>>>,
    pub(crate) registry: RwLock<Arc<ToolRegistry>>,
    next_id: AtomicU64,
    outbound: mpsc::Sender<String>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl SessionInner {
    /// Allocate a fresh correlation id, unique for this session
    pub(crate) fn next_correlation_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Register a result slot for a correlation id before sending
    pub(crate) async fn register_pending(&self, id: u64) -> oneshot::Receiver<CallOutcome> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        rx
    }

    /// Register a result slot for a call issued against a ready session.
    ///
    /// Re-checks the state after the insert: `close()` and loss handling
    /// both flip the state before draining the pending map, so a call that
    /// raced past the readiness gate either gets drained with the rest or
    /// finds the state already terminal here and evicts its own slot.
    /// Without this a racing call would sit out its full deadline and
    /// resolve `CallTimeout` on a session that is already closed.
    pub(crate) async fn register_call(&self, id: u64) -> Result<oneshot::Receiver<CallOutcome>> {
        let slot = self.register_pending(id).await;
        match *self.state.read().await {
            SessionState::Ready => Ok(slot),
            SessionState::Closing | SessionState::Closed => {
                self.discard_pending(id).await;
                Err(Error::SessionClosed)
            }
            other => {
                self.discard_pending(id).await;
                Err(Error::SessionLost(format!("session {other} during call registration")))
            }
        }
    }

    /// Drop a pending entry, typically after its deadline elapsed. A late
    /// response for the id will find no slot and be discarded.
    pub(crate) async fn discard_pending(&self, id: u64) {
        self.pending.lock().await.remove(&id);
    }

    /// Hand a frame to the transport's writer task
    pub(crate) async fn send_frame(&self, frame: String) -> Result<()> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| Error::SessionLost("transport writer stopped".to_string()))
    }

    /// Gate operations that require a ready session
    pub(crate) async fn ensure_ready(&self) -> Result<()> {
        let state = *self.state.read().await;
        match state {
            SessionState::Ready => Ok(()),
            SessionState::Closing | SessionState::Closed => Err(Error::SessionClosed),
            SessionState::Errored => Err(Error::SessionLost("session errored".to_string())),
            other => Err(Error::SessionNotReady(other)),
        }
    }

    /// Fail every outstanding call with an error from `make_err`
    pub(crate) async fn fail_all_pending<F>(&self, make_err: F)
    where
        F: Fn() -> Error,
    {
        let mut pending = self.pending.lock().await;
        if !pending.is_empty() {
            debug!(count = pending.len(), "failing outstanding calls");
        }
        for (_, slot) in pending.drain() {
            let _ = slot.send(Err(make_err()));
        }
    }

    /// Tear down the transport, releasing the child process or connection
    async fn shutdown_transport(&self) {
        if let Some(tx) = self.shutdown.lock().await.take() {
            let _ = tx.send(());
        }
    }

    /// Transition into `Errored`, failing all outstanding calls; a no-op if
    /// the session already reached a terminal or closing state
    async fn enter_errored<F>(&self, reason: &str, make_err: F)
    where
        F: Fn() -> Error,
    {
        {
            let mut state = self.state.write().await;
            match *state {
                SessionState::Closing | SessionState::Closed | SessionState::Errored => return,
                _ => *state = SessionState::Errored,
            }
        }
        warn!("session errored: {reason}");
        self.fail_all_pending(make_err).await;
        self.shutdown_transport().await;
    }
}

/// One live provider connection
///
/// Created via [`Session::open`] (or [`Session::connect`] for a custom
/// transport); the returned session is already `Ready`. All methods take
/// `&self` - calls multiplex freely over the one transport stream.
pub struct Session {
    inner: Arc<SessionInner>,
    created_at: Instant,
    server_info: ServerInfo,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("created_at", &self.created_at)
            .field("server_info", &self.server_info)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open the configured transport and run the handshake
    ///
    /// Transport open failures and handshake failures (timeout, malformed
    /// or incompatible response) are fatal: no session is returned and no
    /// retry happens inside the bridge.
    pub async fn open(config: BridgeConfig) -> Result<Self> {
        debug!(kind = config.transport.kind(), "connecting to provider");
        let transport = TransportHandle::open(&config.transport).await?;
        Self::connect(transport, config).await
    }

    /// Run the handshake over an already-open transport
    ///
    /// The `transport` section of the config is not consulted here; the
    /// given handle is used as-is. This is the entry point for in-memory
    /// providers and tests.
    pub async fn connect(transport: TransportHandle, config: BridgeConfig) -> Result<Self> {
        let (outbound, inbound, shutdown) = transport.into_parts();
        let inner = Arc::new(SessionInner {
            config,
            state: RwLock::new(SessionState::Handshaking),
            pending: Mutex::new(HashMap::new()),
            registry: RwLock::new(Arc::new(ToolRegistry::default())),
            next_id: AtomicU64::new(1),
            outbound,
            shutdown: Mutex::new(shutdown),
        });
        let created_at = Instant::now();

        // Register the handshake slot before the router starts consuming,
        // so a fast provider cannot race its ack past us.
        let handshake_id = inner.next_correlation_id();
        let ack = inner.register_pending(handshake_id).await;
        let request = Request::initialize(handshake_id);
        if let Err(e) = inner.send_frame(protocol::encode_frame(&request)?).await {
            inner
                .enter_errored("failed to send initialize", || {
                    Error::SessionLost("failed to send initialize".to_string())
                })
                .await;
            return Err(e);
        }

        tokio::spawn(route_inbound(Arc::clone(&inner), inbound));

        match await_handshake(&inner, handshake_id, ack).await {
            Ok(init) => {
                *inner.state.write().await = SessionState::Ready;
                info!(
                    server = %init.server_info.name,
                    version = init.server_info.version.as_deref().unwrap_or("unknown"),
                    "session ready"
                );
                Ok(Session {
                    inner,
                    created_at,
                    server_info: init.server_info,
                })
            }
            Err(e) => {
                inner
                    .enter_errored(&format!("handshake failed: {e}"), || {
                        Error::SessionLost("handshake failed".to_string())
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Current connection state
    pub async fn state(&self) -> SessionState {
        *self.inner.state.read().await
    }

    /// When this session was created
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Provider identity captured during the handshake
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Discover the provider's tools and rebuild the registry
    ///
    /// Requires `Ready`. Descriptors keep the provider's declared order;
    /// the configured allow-list is applied before anything enters the
    /// registry. Calling again rebuilds the registry from scratch.
    pub async fn discover(&self) -> Result<Arc<ToolRegistry>> {
        discovery::discover(&self.inner).await
    }

    /// Snapshot of the current tool registry (empty before discovery)
    pub async fn tools(&self) -> Arc<ToolRegistry> {
        Arc::clone(&*self.inner.registry.read().await)
    }

    /// Invoke a discovered tool and await its correlated response
    pub async fn invoke(&self, tool: &str, arguments: Value) -> Result<ToolOutput> {
        proxy::invoke(&self.inner, tool, arguments).await
    }

    /// Close the session, failing every outstanding call with
    /// `SessionClosed` and releasing the transport. Idempotent.
    pub async fn close(&self) {
        {
            let mut state = self.inner.state.write().await;
            match *state {
                SessionState::Closed | SessionState::Errored => return,
                _ => *state = SessionState::Closing,
            }
        }
        self.inner.fail_all_pending(|| Error::SessionClosed).await;
        self.inner.shutdown_transport().await;
        *self.inner.state.write().await = SessionState::Closed;
        info!("session closed");
    }
}

/// Await the initialize acknowledgment under the handshake timeout and
/// validate protocol compatibility
async fn await_handshake(
    inner: &Arc<SessionInner>,
    handshake_id: u64,
    ack: oneshot::Receiver<CallOutcome>,
) -> Result<InitializeResult> {
    let timeout = inner.config.handshake_timeout;
    let payload = match tokio::time::timeout(timeout, ack).await {
        Err(_) => {
            inner.discard_pending(handshake_id).await;
            return Err(Error::HandshakeTimeout(timeout));
        }
        Ok(Err(_)) => {
            // Result slot dropped without resolution: router died
            return Err(Error::SessionLost("transport closed during handshake".to_string()));
        }
        Ok(Ok(Err(Error::Remote { message, .. }))) => {
            return Err(Error::IncompatibleHandshake(format!(
                "provider rejected initialize: {message}"
            )));
        }
        Ok(Ok(Err(e))) => return Err(e),
        Ok(Ok(Ok(payload))) => payload,
    };

    let init: InitializeResult = serde_json::from_value(payload).map_err(|e| {
        Error::IncompatibleHandshake(format!("unparsable initialize result: {e}"))
    })?;

    if init.protocol_version != protocol::PROTOCOL_VERSION {
        return Err(Error::IncompatibleHandshake(format!(
            "provider speaks protocol '{}', expected '{}'",
            init.protocol_version,
            protocol::PROTOCOL_VERSION
        )));
    }

    inner
        .send_frame(protocol::encode_frame(&Notification::initialized())?)
        .await?;

    Ok(init)
}

/// Router task: owns the inbound half of the transport and dispatches
/// every message for the session's lifetime
async fn route_inbound(inner: Arc<SessionInner>, mut inbound: mpsc::Receiver<String>) {
    while let Some(frame) = inbound.recv().await {
        match protocol::decode(&frame) {
            Ok(Inbound::Response(response)) => dispatch_response(&inner, response).await,
            Ok(Inbound::Notification(notification)) => handle_notification(&notification),
            Ok(Inbound::Request(request)) => {
                debug!(method = %request.method, "ignoring unsupported provider-initiated request");
            }
            Err(e) => {
                let handshaking = *inner.state.read().await == SessionState::Handshaking;
                if handshaking {
                    // Protocol garbage during the handshake is fatal
                    let message = e.to_string();
                    inner
                        .enter_errored("malformed message during handshake", || {
                            Error::MalformedMessage(message.clone())
                        })
                        .await;
                    return;
                }
                warn!("ignoring malformed message from provider: {e}");
            }
        }
    }

    // Inbound channel closed: the provider process exited or the stream
    // dropped. During an orderly close this is expected.
    let state = *inner.state.read().await;
    if matches!(state, SessionState::Closing | SessionState::Closed) {
        return;
    }
    inner
        .enter_errored("transport closed", || {
            Error::SessionLost("transport closed".to_string())
        })
        .await;
}

/// Deliver a response to its pending call by correlation id
async fn dispatch_response(inner: &SessionInner, response: protocol::Response) {
    let Some(id) = response.id else {
        warn!("discarding response without correlation id");
        return;
    };

    let slot = inner.pending.lock().await.remove(&id);
    match slot {
        Some(slot) => {
            let outcome = match response.error {
                Some(error) => Err(error.into()),
                None => Ok(response.result.unwrap_or(Value::Null)),
            };
            // Receiver may have timed out and gone away; that is fine
            let _ = slot.send(outcome);
        }
        None => {
            // Late (post-timeout) or never-issued id; no compensating
            // action is defined, so discard and log
            debug!(id, "discarding response with no pending call");
        }
    }
}

fn handle_notification(notification: &Notification) {
    match notification.method.as_str() {
        protocol::methods::TOOLS_LIST_CHANGED => {
            info!("provider reported a tool list change; call discover() to rebuild the registry");
        }
        other => {
            debug!(method = other, "ignoring provider notification");
        }
    }
}
