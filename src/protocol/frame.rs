//! Frame struct with typed accessors.
//!
//! Represents a complete protocol frame with header and payload.
//! Uses `bytes::Bytes` for zero-copy payload sharing.

use bytes::Bytes;

use super::wire_format::{FrameKind, Header, HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get the frame kind.
    #[inline]
    pub fn kind(&self) -> FrameKind {
        self.header.kind
    }

    /// Get the invocation or stream id.
    #[inline]
    pub fn id(&self) -> u32 {
        self.header.id
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Check if the payload is an error string.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.header.is_error()
    }
}

/// Build a complete frame as a single byte vector.
///
/// # Example
///
/// ```
/// use wireup::protocol::{build_frame, FrameKind, Header, HEADER_SIZE};
///
/// let header = Header::new(FrameKind::StreamItem, 0, 42, 5);
/// let bytes = build_frame(&header, b"hello");
/// assert_eq!(bytes.len(), HEADER_SIZE + 5);
/// ```
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
