//! Wire format encoding and decoding.
//!
//! Implements the 10-byte header format:
//! ```text
//! ┌──────┬───────┬──────────┬──────────┐
//! │ Kind │ Flags │ Id       │ Length   │
//! │ 1 B  │ 1 B   │ 4 bytes  │ 4 bytes  │
//! │      │       │ uint32 BE│ uint32 BE│
//! └──────┴───────┴──────────┴──────────┘
//! ```
//!
//! `Id` is an invocation id for `Invoke`, `Completion` and `Cancel` frames,
//! and a stream id for `StreamItem` and `StreamComplete` frames.
//! All multi-byte integers are Big Endian.

use crate::error::{Result, WireupError};

/// Header size in bytes (fixed, exactly 10).
pub const HEADER_SIZE: usize = 10;

/// Default maximum payload size (64 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

/// Invocation id used by fire-and-forget calls; no completion is sent back.
pub const NO_REPLY_ID: u32 = 0;

/// Flag constants for the protocol.
pub mod flags {
    /// Payload is an error string instead of a value.
    pub const ERROR: u8 = 0b0000_0001;

    /// Reserved bits mask.
    pub const RESERVED_MASK: u8 = !ERROR;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

/// Frame kind carried in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Client → server: start a remote call.
    Invoke = 1,
    /// Client → server: one item of a streaming argument.
    StreamItem = 2,
    /// Client → server: end of a streaming argument.
    StreamComplete = 3,
    /// Server → client: result (or error) of an invocation.
    Completion = 4,
    /// Client → server: caller abandoned the invocation.
    Cancel = 5,
}

impl FrameKind {
    /// Map a wire byte to a frame kind.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(FrameKind::Invoke),
            2 => Some(FrameKind::StreamItem),
            3 => Some(FrameKind::StreamComplete),
            4 => Some(FrameKind::Completion),
            5 => Some(FrameKind::Cancel),
            _ => None,
        }
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// What this frame carries.
    pub kind: FrameKind,
    /// Flags byte (see `flags` module).
    pub flags: u8,
    /// Invocation or stream identifier.
    pub id: u32,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(kind: FrameKind, flags: u8, id: u32, payload_length: u32) -> Self {
        Self {
            kind,
            flags,
            id,
            payload_length,
        }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use wireup::protocol::{FrameKind, Header, HEADER_SIZE};
    ///
    /// let header = Header::new(FrameKind::StreamItem, 0, 7, 100);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), HEADER_SIZE);
    /// assert_eq!(bytes[0], 2);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.kind as u8;
        buf[1] = self.flags;
        buf[2..6].copy_from_slice(&self.id.to_be_bytes());
        buf[6..10].copy_from_slice(&self.payload_length.to_be_bytes());
        buf
    }

    /// Decode and validate a header.
    ///
    /// Returns `Ok(None)` if the buffer is too short, and a protocol error
    /// for an unknown kind or reserved flag bits.
    pub fn decode(buf: &[u8]) -> Result<Option<Self>> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let kind = FrameKind::from_u8(buf[0])
            .ok_or_else(|| WireupError::Protocol(format!("Unknown frame kind {}", buf[0])))?;

        let flags = buf[1];
        if flags & flags::RESERVED_MASK != 0 {
            return Err(WireupError::Protocol(
                "Reserved flag bits must be 0".to_string(),
            ));
        }

        Ok(Some(Self {
            kind,
            flags,
            id: u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]),
            payload_length: u32::from_be_bytes([buf[6], buf[7], buf[8], buf[9]]),
        }))
    }

    /// Check if the payload is an error string.
    #[inline]
    pub fn is_error(&self) -> bool {
        flags::has_flag(self.flags, flags::ERROR)
    }

    /// Check if this invocation expects no completion.
    #[inline]
    pub fn is_no_reply(&self) -> bool {
        self.kind == FrameKind::Invoke && self.id == NO_REPLY_ID
    }
}
