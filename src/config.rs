//! Bridge configuration
//!
//! The agent runtime owns config file loading and credential resolution;
//! the bridge consumes the already-deserialized structs below.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for one provider connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// How to reach the provider
    pub transport: TransportConfig,

    /// Deadline for a single tool call; discovery runs under the same deadline
    #[serde(with = "humantime_serde", default = "default_call_timeout")]
    pub call_timeout: Duration,

    /// Deadline for the initial handshake exchange
    #[serde(with = "humantime_serde", default = "default_handshake_timeout")]
    pub handshake_timeout: Duration,

    /// Optional allow-list of tool names. When present, tools whose name is
    /// absent from the list are dropped at discovery time and never enter
    /// the registry.
    #[serde(default)]
    pub allowed_tools: Option<Vec<String>>,
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_handshake_timeout() -> Duration {
    Duration::from_secs(10)
}

impl BridgeConfig {
    /// Config for a subprocess provider spoken to over stdin/stdout
    pub fn stdio(command: impl Into<String>) -> Self {
        BridgeConfig {
            transport: TransportConfig::Stdio {
                command: command.into(),
                args: Vec::new(),
                env: HashMap::new(),
            },
            call_timeout: default_call_timeout(),
            handshake_timeout: default_handshake_timeout(),
            allowed_tools: None,
        }
    }

    /// Config for a remote provider behind a streaming HTTP endpoint
    pub fn http(endpoint: impl Into<String>) -> Self {
        BridgeConfig {
            transport: TransportConfig::Http {
                endpoint: endpoint.into(),
                headers: HashMap::new(),
            },
            call_timeout: default_call_timeout(),
            handshake_timeout: default_handshake_timeout(),
            allowed_tools: None,
        }
    }

    /// Set subprocess arguments (no-op for HTTP transports)
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        if let TransportConfig::Stdio { args: a, .. } = &mut self.transport {
            *a = args.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Add environment variable overrides for a subprocess provider
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let TransportConfig::Stdio { env, .. } = &mut self.transport {
            env.insert(key.into(), value.into());
        }
        self
    }

    /// Add a header sent on every request to an HTTP provider
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let TransportConfig::Http { headers, .. } = &mut self.transport {
            headers.insert(key.into(), value.into());
        }
        self
    }

    /// Set the per-call timeout
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the handshake timeout
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Restrict the registry to the given tool names
    pub fn with_allowed_tools(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_tools = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

/// Transport selection for a provider connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Spawn a subprocess and speak over its stdin/stdout
    Stdio {
        /// Command to execute
        command: String,
        /// Arguments to pass
        #[serde(default)]
        args: Vec<String>,
        /// Environment variable overrides
        #[serde(default)]
        env: HashMap<String, String>,
    },
    /// Persistent streaming HTTP endpoint
    Http {
        /// Endpoint URL
        endpoint: String,
        /// Headers sent on every request (auth lives here)
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

impl TransportConfig {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            TransportConfig::Stdio { .. } => "stdio",
            TransportConfig::Http { .. } => "http",
        }
    }
}
