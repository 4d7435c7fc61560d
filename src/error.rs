//! Error types for wireup.

use thiserror::Error;

/// Main error type for all wireup operations.
#[derive(Debug, Error)]
pub enum WireupError {
    /// I/O error during socket or file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Scalar argument could not be converted to a JSON value.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Protocol error (invalid frame, unknown kind, oversized payload).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Enqueue attempted on a pipe that was closed, or whose reader is gone.
    ///
    /// A producer receiving this must stop producing.
    #[error("Stream pipe closed")]
    Closed,

    /// Non-blocking enqueue on a bounded pipe that is at capacity.
    #[error("Stream pipe full")]
    PipeFull,

    /// The producer's source failed; the stream ended early.
    #[error("Stream source failed: {0}")]
    Source(String),

    /// File chunking requested with a chunk size of zero.
    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(usize),

    /// Transport-level failure while establishing the connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The remote procedure reported a failure.
    #[error("Remote invocation failed: {0}")]
    Rpc(String),

    /// Connection dropped while a call was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Writer queue stayed full for longer than the send timeout.
    #[error("Backpressure timeout")]
    BackpressureTimeout,
}

impl WireupError {
    /// True for failures reported by, or on the way to, the remote procedure.
    pub fn is_rpc_failure(&self) -> bool {
        matches!(self, WireupError::Rpc(_) | WireupError::ConnectionClosed)
    }
}

/// Result type alias using WireupError.
pub type Result<T> = std::result::Result<T, WireupError>;
