//! Codec module - MessagePack encoding for stream items, arguments and results.
//!
//! Every payload that crosses the connection is MessagePack:
//! - each stream item (one frame per item)
//! - the invocation message carrying method name and scalar arguments
//! - the completion value or error string returned by the remote
//!
//! # Example
//!
//! ```
//! use wireup::codec::MsgPackCodec;
//!
//! let encoded = MsgPackCodec::encode(&"hello").unwrap();
//! let decoded: String = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

mod msgpack;

pub use msgpack::MsgPackCodec;
