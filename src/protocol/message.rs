//! Invocation message carried by `Invoke` frames.

use serde::{Deserialize, Serialize};

/// Names the remote method, its scalar arguments, and the stream ids whose
/// items will follow as `StreamItem` frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// Remote method name.
    pub target: String,
    /// Scalar arguments in call order.
    pub arguments: Vec<serde_json::Value>,
    /// Stream ids in call order.
    pub stream_ids: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MsgPackCodec;

    #[test]
    fn test_invocation_wire_shape() {
        let invocation = Invocation {
            target: "UploadWithSuffix".to_string(),
            arguments: vec![serde_json::json!(" + suffix")],
            stream_ids: vec![3],
        };

        let encoded = MsgPackCodec::encode(&invocation).unwrap();
        // Struct-as-map with 3 fields
        assert_eq!(encoded[0], 0x83);

        let decoded: Invocation = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, invocation);
    }
}
