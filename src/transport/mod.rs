//! Transports - duplex message channels to a provider
//!
//! A transport pumps newline-framed protocol messages between the session
//! and a provider: a subprocess spoken to over stdin/stdout, or a remote
//! endpoint behind a streaming HTTP connection. Both kinds present the
//! same [`TransportHandle`], so the session never cares which one it got.
//!
//! Outbound frames are consumed by a single writer task owned by the
//! transport, so concurrent senders never interleave partial frames. The
//! inbound channel closing is the `Closed` event: the provider went away.

mod http;
mod stdio;

use tokio::sync::{mpsc, oneshot};

use crate::config::TransportConfig;
use crate::error::Result;

/// Channel capacity for each direction of a transport
const CHANNEL_CAPACITY: usize = 64;

/// Duplex message channel to one provider, exclusively owned by a session
pub struct TransportHandle {
    outbound: mpsc::Sender<String>,
    inbound: mpsc::Receiver<String>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TransportHandle {
    /// Open the transport selected by the config
    ///
    /// Spawning or connecting happens here; failures map to
    /// `SpawnFailed`, `Unreachable`, or `AuthRejected`.
    pub async fn open(config: &TransportConfig) -> Result<Self> {
        match config {
            TransportConfig::Stdio { command, args, env } => stdio::open(command, args, env),
            TransportConfig::Http { endpoint, headers } => http::open(endpoint, headers).await,
        }
    }

    /// In-memory duplex pair: a handle for the session side and a
    /// [`ProviderEnd`] for driving the provider side directly. Used by
    /// tests and by embedding an in-process provider.
    pub fn duplex(buffer: usize) -> (TransportHandle, ProviderEnd) {
        let (to_provider, from_client) = mpsc::channel(buffer);
        let (to_client, from_provider) = mpsc::channel(buffer);
        let handle = TransportHandle {
            outbound: to_provider,
            inbound: from_provider,
            shutdown: None,
        };
        let provider = ProviderEnd { to_client, from_client };
        (handle, provider)
    }

    pub(crate) fn from_parts(
        outbound: mpsc::Sender<String>,
        inbound: mpsc::Receiver<String>,
        shutdown: Option<oneshot::Sender<()>>,
    ) -> Self {
        TransportHandle { outbound, inbound, shutdown }
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        mpsc::Sender<String>,
        mpsc::Receiver<String>,
        Option<oneshot::Sender<()>>,
    ) {
        (self.outbound, self.inbound, self.shutdown)
    }
}

/// The provider side of an in-memory duplex transport
pub struct ProviderEnd {
    to_client: mpsc::Sender<String>,
    from_client: mpsc::Receiver<String>,
}

impl ProviderEnd {
    /// Deliver one frame to the session
    pub async fn send(&self, frame: impl Into<String>) -> bool {
        self.to_client.send(frame.into()).await.is_ok()
    }

    /// Receive the next frame sent by the session, or `None` once the
    /// session side is gone
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }
}
