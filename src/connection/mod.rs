//! Connection module - the seam between upload orchestration and the remote.
//!
//! [`Connection`] is the only thing the orchestrator needs from a remote:
//! invoke a method by name with streaming and scalar arguments, either
//! waiting for its result or fire-and-forget.
//!
//! [`WireConnection`] implements it over any byte stream using the framing
//! in [`crate::protocol`].
//!
//! # Example
//!
//! ```ignore
//! use wireup::connection::{connect, Connection};
//! use wireup::call::UploadCall;
//! use wireup::pipe::stream_pipe;
//!
//! let connection = connect("tcp://127.0.0.1:5000").await?;
//!
//! let (mut writer, reader) = stream_pipe::<i64>(0);
//! let result = connection.invoke(UploadCall::new("Sum").stream(reader));
//! for i in 1..=5 {
//!     writer.enqueue(i).await?;
//! }
//! writer.close();
//! let encoded = result.await?;
//! ```

mod config;
mod wire;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::call::UploadCall;
use crate::error::Result;

pub use config::{ConnectionBuilder, ConnectionConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_BUFFER_SIZE};
pub use wire::WireConnection;

/// Boxed future returned by [`Connection`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An open connection able to carry streaming calls.
pub trait Connection: Send + Sync {
    /// Invoke `call` and resolve with the MsgPack-encoded result.
    ///
    /// Resolves only after the remote has consumed every streaming argument
    /// through its close and returned. Fails with [`Rpc`] if the remote
    /// reports an error and [`ConnectionClosed`] if the connection drops
    /// mid-call.
    ///
    /// [`Rpc`]: crate::WireupError::Rpc
    /// [`ConnectionClosed`]: crate::WireupError::ConnectionClosed
    fn invoke(&self, call: UploadCall) -> BoxFuture<'_, Result<Bytes>>;

    /// Submit `call` without waiting for a result.
    ///
    /// Resolves once the request is accepted; streaming arguments keep
    /// draining in the background.
    fn send(&self, call: UploadCall) -> BoxFuture<'_, Result<()>>;
}

impl<C: Connection + ?Sized> Connection for Arc<C> {
    fn invoke(&self, call: UploadCall) -> BoxFuture<'_, Result<Bytes>> {
        (**self).invoke(call)
    }

    fn send(&self, call: UploadCall) -> BoxFuture<'_, Result<()>> {
        (**self).send(call)
    }
}

/// Connect to `url` with default configuration.
///
/// Fails with [`ConnectionError`](crate::WireupError::Connection) on an
/// unparsable URL or a transport failure.
pub async fn connect(url: &str) -> Result<WireConnection> {
    ConnectionBuilder::new().connect(url).await
}
