//! Error types for the bridge

use std::time::Duration;

use thiserror::Error;

use crate::session::SessionState;

/// Result type alias using the bridge's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the bridge
#[derive(Error, Debug)]
pub enum Error {
    /// Provider subprocess could not be spawned
    #[error("Failed to spawn provider: {0}")]
    SpawnFailed(String),

    /// Remote endpoint could not be reached
    #[error("Provider unreachable: {0}")]
    Unreachable(String),

    /// Remote endpoint rejected our credentials at connect time
    #[error("Provider rejected authentication: {0}")]
    AuthRejected(String),

    /// Inbound bytes could not be parsed as a protocol message
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Handshake response was missing, unparsable, or declared an
    /// unsupported protocol version
    #[error("Incompatible handshake: {0}")]
    IncompatibleHandshake(String),

    /// Handshake acknowledgment did not arrive in time
    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// Tool discovery did not complete in time
    #[error("Tool discovery timed out after {0:?}")]
    DiscoveryTimeout(Duration),

    /// Invoked tool is not present in the session's registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments did not match the tool's input schema; nothing was sent
    #[error("Invalid arguments for tool '{tool}': {reason}")]
    ArgumentValidation { tool: String, reason: String },

    /// Provider-reported application failure, distinct from transport faults
    #[error("Remote error {code}: {message}")]
    Remote {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Call deadline elapsed before the matching response arrived
    #[error("Call timed out after {0:?}")]
    CallTimeout(Duration),

    /// Session was explicitly closed
    #[error("Session closed")]
    SessionClosed,

    /// Session died underneath us (transport loss, provider exit)
    #[error("Session lost: {0}")]
    SessionLost(String),

    /// Operation requires a ready session
    #[error("Session not ready (state: {0})")]
    SessionNotReady(SessionState),
}

impl Error {
    /// True when the tool itself reported failure, as opposed to the
    /// bridge failing to complete the call.
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::Remote { .. })
    }

    /// True for failures scoped to a single call; these never affect other
    /// outstanding calls or the session's state.
    pub fn is_call_scoped(&self) -> bool {
        matches!(
            self,
            Error::UnknownTool(_)
                | Error::ArgumentValidation { .. }
                | Error::Remote { .. }
                | Error::CallTimeout(_)
        )
    }

    /// True when the session is gone and a new one must be opened to retry
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Error::SpawnFailed(_)
                | Error::Unreachable(_)
                | Error::AuthRejected(_)
                | Error::IncompatibleHandshake(_)
                | Error::HandshakeTimeout(_)
                | Error::SessionClosed
                | Error::SessionLost(_)
        )
    }
}

impl From<crate::protocol::RpcError> for Error {
    fn from(err: crate::protocol::RpcError) -> Self {
        Error::Remote {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}
