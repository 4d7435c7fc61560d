//! Upload orchestration on top of a [`Connection`].
//!
//! [`Uploader`] pairs local producers with remote calls: it creates the
//! stream pipes, starts one producer per pipe and hands the read sides to
//! the connection. Every upload owns its own pipe and producer, so
//! concurrent uploads share nothing but the connection.

use futures::future::try_join_all;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::call::UploadCall;
use crate::codec::MsgPackCodec;
use crate::connection::Connection;
use crate::error::{Result, WireupError};
use crate::pipe::{stream_pipe, PipeReader};
use crate::producer::{start_producer, Pacing, ProducerHandle};

/// Drives streaming uploads over one connection.
pub struct Uploader<C> {
    connection: C,
}

impl<C: Connection> Uploader<C> {
    /// Wrap an open connection.
    pub fn new(connection: C) -> Self {
        Self { connection }
    }

    /// Get the underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Unwrap the underlying connection.
    pub fn into_inner(self) -> C {
        self.connection
    }

    /// Invoke `method` with one streaming argument plus scalar `args`.
    ///
    /// Resolves once the remote has consumed the stream through its close
    /// and returned a result.
    pub async fn invoke_streaming<T, R>(&self, method: &str, reader: PipeReader<T>, args: Vec<Value>) -> Result<R>
    where
        T: Serialize + Send + 'static,
        R: DeserializeOwned,
    {
        self.invoke(with_args(UploadCall::new(method).stream(reader), args)).await
    }

    /// Invoke an arbitrary call and decode its result.
    pub async fn invoke<R: DeserializeOwned>(&self, call: UploadCall) -> Result<R> {
        tracing::debug!("Invoking {:?}", call);
        let encoded = self.connection.invoke(call).await?;
        MsgPackCodec::decode(&encoded)
    }

    /// Fire-and-forget variant of [`invoke_streaming`](Self::invoke_streaming).
    ///
    /// Returns once the request is accepted. The stream keeps draining
    /// in the background.
    pub async fn send_streaming<T>(&self, method: &str, reader: PipeReader<T>, args: Vec<Value>) -> Result<()>
    where
        T: Serialize + Send + 'static,
    {
        self.send(with_args(UploadCall::new(method).stream(reader), args)).await
    }

    /// Fire-and-forget an arbitrary call.
    pub async fn send(&self, call: UploadCall) -> Result<()> {
        tracing::debug!("Sending {:?}", call);
        self.connection.send(call).await
    }

    /// Invoke `call` whose streams are fed by `producers`.
    ///
    /// On success every producer is joined and its failure, if any, is
    /// returned. On failure the producers are aborted; a producer's own
    /// error takes precedence over the remote's, since it is the root cause.
    pub async fn invoke_produced<R: DeserializeOwned>(
        &self,
        call: UploadCall,
        producers: Vec<ProducerHandle>,
    ) -> Result<R> {
        match self.invoke(call).await {
            Ok(result) => {
                for producer in producers {
                    producer.join().await?;
                }
                Ok(result)
            }
            Err(remote) => {
                for producer in &producers {
                    producer.abort();
                }
                for producer in producers {
                    match producer.join().await {
                        Ok(_) | Err(WireupError::Closed) => {}
                        Err(local) => {
                            tracing::debug!("Remote failure {} caused by producer", remote);
                            return Err(local);
                        }
                    }
                }
                Err(remote)
            }
        }
    }

    /// Create a pipe, start a producer on `source` and invoke `method` with it.
    pub async fn upload<S, T, R>(
        &self,
        method: &str,
        source: S,
        capacity: usize,
        pacing: Pacing,
        args: Vec<Value>,
    ) -> Result<R>
    where
        S: Stream<Item = Result<T>> + Send + 'static,
        T: Serialize + Send + 'static,
        R: DeserializeOwned,
    {
        let (writer, reader) = stream_pipe(capacity);
        let producer = start_producer(source, writer, pacing);
        let call = with_args(UploadCall::new(method).stream(reader), args);

        self.invoke_produced(call, vec![producer]).await
    }

    /// Run one independent upload per source concurrently.
    ///
    /// Results come back in source order. The first failure fails the
    /// whole batch and abandons the remaining calls.
    pub async fn run_interleaved<S, T, R>(
        &self,
        method: &str,
        sources: Vec<S>,
        capacity: usize,
        pacing: Pacing,
    ) -> Result<Vec<R>>
    where
        S: Stream<Item = Result<T>> + Send + 'static,
        T: Serialize + Send + 'static,
        R: DeserializeOwned,
    {
        let uploads = sources
            .into_iter()
            .map(|source| self.upload(method, source, capacity, pacing, Vec::new()));

        try_join_all(uploads).await
    }
}

fn with_args(call: UploadCall, args: Vec<Value>) -> UploadCall {
    args.into_iter().fold(call, |call, arg| call.arg(arg))
}
