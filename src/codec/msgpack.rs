//! MsgPack codec using `rmp-serde`.
//!
//! Structs are always written with `to_vec_named` (struct-as-map) so the
//! remote side can decode invocation messages by field name.
//!
//! Byte chunks should be carried as [`bytes::Bytes`], which serializes as
//! MessagePack `bin` rather than an array of integers.

use bytes::Bytes;

use crate::error::Result;

/// MessagePack codec for structured data.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Encode a value straight into a frame payload.
    #[inline]
    pub fn encode_bytes<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes> {
        Self::encode(value).map(Bytes::from)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Upload {
        target: String,
        size: u64,
    }

    #[test]
    fn test_struct_is_written_as_map() {
        let upload = Upload {
            target: "bloop.jpg".to_string(),
            size: 8192,
        };

        let encoded = MsgPackCodec::encode(&upload).unwrap();

        // 0x82 = fixmap with 2 entries, an array would be 0x92
        assert_eq!(encoded[0], 0x82, "Expected fixmap, got {:02X}", encoded[0]);

        let decoded: Upload = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, upload);
    }

    #[test]
    fn test_bytes_chunk_uses_bin_format() {
        let chunk = Bytes::from_static(&[0x01, 0x02, 0x03, 0x04, 0x05]);
        let encoded = MsgPackCodec::encode(&chunk).unwrap();

        // bin8 marker, then length
        assert_eq!(encoded[0], 0xc4);
        assert_eq!(encoded[1], 5);

        let decoded: Bytes = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn test_json_value_arguments() {
        let args = vec![
            serde_json::json!(" + wooh I'm a suffix"),
            serde_json::json!(42),
        ];
        let encoded = MsgPackCodec::encode_bytes(&args).unwrap();
        let decoded: Vec<serde_json::Value> = MsgPackCodec::decode(&encoded).unwrap();

        assert_eq!(decoded[0].as_str(), Some(" + wooh I'm a suffix"));
        assert_eq!(decoded[1].as_i64(), Some(42));
    }

    #[test]
    fn test_string_item() {
        let encoded = MsgPackCodec::encode("h").unwrap();
        // fixstr of length 1
        assert_eq!(encoded, vec![0xa1, b'h']);
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let result: Result<Upload> = MsgPackCodec::decode(b"not valid msgpack");
        assert!(result.is_err());
    }
}
