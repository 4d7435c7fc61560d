//! Connection configuration and builder.

use std::time::Duration;

use crate::error::Result;
use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;
use crate::transport::{connect_endpoint, Endpoint, Io};
use crate::writer::WriterConfig;

use super::WireConnection;

/// Default time allowed for establishing the transport.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default socket read buffer size.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Settings for a [`WireConnection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Writer task settings.
    pub writer: WriterConfig,
    /// Time allowed for establishing the transport.
    pub connect_timeout: Duration,
    /// Largest accepted inbound payload.
    pub max_payload_size: u32,
    /// Socket read buffer size.
    pub read_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            writer: WriterConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl ConnectionConfig {
    /// Defaults overridden by environment variables:
    ///
    /// - `WIREUP_CONNECT_TIMEOUT_MS`
    /// - `WIREUP_SEND_TIMEOUT_MS`
    /// - `WIREUP_MAX_PAYLOAD` (bytes)
    ///
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |name: &str| {
            lookup(name)
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        let mut config = Self::default();
        if let Some(timeout) = millis("WIREUP_CONNECT_TIMEOUT_MS") {
            config.connect_timeout = timeout;
        }
        if let Some(timeout) = millis("WIREUP_SEND_TIMEOUT_MS") {
            config.writer.send_timeout = timeout;
        }
        if let Some(max) = lookup("WIREUP_MAX_PAYLOAD").and_then(|v| v.parse().ok()) {
            config.max_payload_size = max;
        }
        config
    }
}

/// Builder for configuring and opening a [`WireConnection`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    config: ConnectionConfig,
}

impl ConnectionBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn with_config(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// Set the transport connect timeout.
    ///
    /// Default: 10 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set how long a frame send may wait on a full writer queue.
    ///
    /// Default: 5 seconds
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.config.writer.send_timeout = timeout;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.writer.channel_capacity = capacity;
        self
    }

    /// Set the largest accepted inbound payload.
    ///
    /// Default: 64 MiB
    pub fn max_payload_size(mut self, max: u32) -> Self {
        self.config.max_payload_size = max;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Parse `url`, open the transport and start the connection.
    pub async fn connect(self, url: &str) -> Result<WireConnection> {
        let endpoint: Endpoint = url.parse()?;
        let io = connect_endpoint(&endpoint, self.config.connect_timeout).await?;
        tracing::info!("Connected to {}", endpoint);
        Ok(WireConnection::start(io, &self.config))
    }

    /// Start the connection over an already open byte stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_io<I: Io>(self, io: I) -> WireConnection {
        WireConnection::start(io, &self.config)
    }
}
