//! Upload call description: method name, streaming arguments, scalar arguments.
//!
//! An [`UploadCall`] holds only the read side of each stream pipe. The
//! write side, and with it the decision when to close, stays with the
//! producer task.
//!
//! # Example
//!
//! ```
//! use wireup::call::UploadCall;
//! use wireup::pipe::stream_pipe;
//!
//! let (_writer, reader) = stream_pipe::<String>(0);
//! let call = UploadCall::new("UploadWithSuffix")
//!     .stream(reader)
//!     .arg(" + wooh I'm a suffix");
//!
//! assert_eq!(call.method(), "UploadWithSuffix");
//! assert_eq!(call.stream_count(), 1);
//! assert_eq!(call.args().len(), 1);
//! ```

use std::fmt;

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;

use crate::codec::MsgPackCodec;
use crate::error::{Result, WireupError};
use crate::pipe::PipeReader;

/// Encoded items of one streaming argument, ending with the pipe's close.
///
/// A trailing `Err` means the producer failed and the stream is incomplete.
pub type ItemStream = BoxStream<'static, Result<Bytes>>;

/// A remote invocation with zero or more streaming arguments.
pub struct UploadCall {
    method: String,
    streams: Vec<ItemStream>,
    args: Vec<serde_json::Value>,
}

impl UploadCall {
    /// Start describing a call to `method`.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            streams: Vec::new(),
            args: Vec::new(),
        }
    }

    /// Add a streaming argument read from `reader`.
    pub fn stream<T>(mut self, reader: PipeReader<T>) -> Self
    where
        T: Serialize + Send + 'static,
    {
        self.streams.push(encode_items(reader));
        self
    }

    /// Add an already encoded streaming argument.
    pub fn raw_stream(mut self, items: ItemStream) -> Self {
        self.streams.push(items);
        self
    }

    /// Add a scalar argument.
    pub fn arg(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Add a scalar argument of any serializable type.
    pub fn try_arg<A: Serialize>(mut self, value: &A) -> Result<Self> {
        self.args.push(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Remote method name.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Scalar arguments in call order.
    pub fn args(&self) -> &[serde_json::Value] {
        &self.args
    }

    /// Number of streaming arguments.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Split into method name, streams and scalar arguments.
    pub fn into_parts(self) -> (String, Vec<ItemStream>, Vec<serde_json::Value>) {
        (self.method, self.streams, self.args)
    }
}

impl fmt::Debug for UploadCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadCall")
            .field("method", &self.method)
            .field("streams", &self.streams.len())
            .field("args", &self.args)
            .finish()
    }
}

/// Drain a pipe, MsgPack-encoding each item.
///
/// A producer fault recorded on the pipe surfaces as a final `Err` item.
pub fn encode_items<T>(reader: PipeReader<T>) -> ItemStream
where
    T: Serialize + Send + 'static,
{
    stream::unfold(Some(reader), |state| async move {
        let Some(mut reader) = state else {
            return None;
        };
        match reader.dequeue_next().await {
            Some(item) => Some((MsgPackCodec::encode_bytes(&item), Some(reader))),
            None => reader
                .fault()
                .map(|reason| (Err(WireupError::Source(reason.to_string())), None)),
        }
    })
    .boxed()
}
