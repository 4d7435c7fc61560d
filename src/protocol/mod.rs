//! Protocol module - wire format, framing, and invocation messages.
//!
//! This module implements the binary protocol spoken by [`WireConnection`]:
//! - 10-byte header encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Frame struct with typed accessors
//! - MsgPack invocation message naming the target method and its streams
//!
//! [`WireConnection`]: crate::connection::WireConnection

mod frame;
mod frame_buffer;
mod message;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use message::Invocation;
pub use wire_format::{flags, FrameKind, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, NO_REPLY_ID};
