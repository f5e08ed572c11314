//! # mcp-bridge
//!
//! A tool-protocol bridge: connect an agent runtime to tool providers that
//! expose remotely-defined, dynamically-discovered functions, and treat
//! those functions as native callable tools.
//!
//! ## Features
//!
//! - **Two transports:** subprocess over stdin/stdout, or a remote
//!   streaming HTTP endpoint
//! - **Typed discovery:** remote JSON Schema adapted into a local tagged
//!   schema tree, with an opaque escape hatch for unknown types
//! - **Multiplexed calls:** many concurrent invocations over one stream,
//!   matched by correlation id, each with its own deadline
//! - **Clean teardown:** closing a session resolves every outstanding call
//!   exactly once and leaks no child process or connection
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mcp_bridge::{BridgeConfig, Session};
//!
//! # async fn example() -> mcp_bridge::Result<()> {
//! let config = BridgeConfig::stdio("my-tool-server").with_args(["--port", "0"]);
//! let session = Session::open(config).await?;
//!
//! let registry = session.discover().await?;
//! for tool in registry.iter() {
//!     println!("{}: {}", tool.name, tool.description);
//! }
//!
//! let output = session.invoke("echo", serde_json::json!({"text": "hi"})).await?;
//! println!("{}", output.text());
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod discovery;
pub mod error;
pub mod protocol;
mod proxy;
pub mod registry;
pub mod schema;
pub mod session;
pub mod transport;

pub use config::{BridgeConfig, TransportConfig};
pub use error::{Error, Result};
pub use protocol::{ContentBlock, ServerInfo};
pub use proxy::ToolOutput;
pub use registry::ToolRegistry;
pub use schema::{FieldSchema, OutputShape, ParamSchema, ToolDescriptor};
pub use session::{Session, SessionState};
pub use transport::{ProviderEnd, TransportHandle};

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
