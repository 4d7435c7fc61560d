//! Frame-based [`Connection`] over a single byte stream.
//!
//! Lifecycle of one request/response call:
//! 1. Allocate an invocation id and register a completion slot
//! 2. Allocate one stream id per streaming argument
//! 3. Queue the `Invoke` frame (method, scalar args, stream ids)
//! 4. Spawn one relay task per stream: `StreamItem`* then `StreamComplete`
//! 5. Resolve when the read loop delivers the matching `Completion`
//!
//! Relays wait for writer room without a deadline, so a slow remote slows
//! the producers feeding the call. A relay that cannot write resolves its
//! call with the error. Relays of a call are aborted once it resolves.
//! Their pipe readers are dropped with them, so a still-running producer
//! sees `Closed` and stops. Abandoning a call after its `Invoke` frame is
//! queued sends a `Cancel` frame.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::{BoxFuture, Connection, ConnectionBuilder, ConnectionConfig};
use crate::call::{ItemStream, UploadCall};
use crate::codec::MsgPackCodec;
use crate::error::{Result, WireupError};
use crate::protocol::{flags, Frame, FrameBuffer, FrameKind, Header, Invocation, NO_REPLY_ID};
use crate::transport::Io;
use crate::writer::{spawn_writer_task, OutboundFrame, WriterHandle};

type CompletionSender = oneshot::Sender<Result<Bytes>>;

/// In-flight invocations awaiting a `Completion`.
#[derive(Default)]
struct CallTable {
    pending: HashMap<u32, CompletionSender>,
    /// Set once the read loop ends; no new calls are accepted.
    closed: bool,
}

struct Shared {
    writer: WriterHandle,
    calls: Mutex<CallTable>,
    next_id: AtomicU32,
}

/// A connection speaking the wireup frame protocol.
///
/// Cheap to share behind an `Arc`; any number of calls may be in flight.
pub struct WireConnection {
    shared: Arc<Shared>,
    reader_task: JoinHandle<()>,
    _writer_task: JoinHandle<Result<()>>,
}

impl WireConnection {
    /// Create a connection builder.
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    pub(super) fn start<I: Io>(io: I, config: &ConnectionConfig) -> Self {
        let (read_half, write_half) = tokio::io::split(io);
        let (writer, writer_task) = spawn_writer_task(write_half, config.writer.clone());

        let shared = Arc::new(Shared {
            writer,
            calls: Mutex::new(CallTable::default()),
            next_id: AtomicU32::new(1),
        });

        let reader_task = tokio::spawn(read_loop(
            read_half,
            shared.clone(),
            config.max_payload_size,
            config.read_buffer_size,
        ));

        Self {
            shared,
            reader_task,
            _writer_task: writer_task,
        }
    }

    /// Number of invocations awaiting completion.
    pub fn in_flight(&self) -> usize {
        self.shared.table().pending.len()
    }

    /// Check whether the remote side has gone away.
    pub fn is_closed(&self) -> bool {
        self.shared.table().closed || self.shared.writer.is_closed()
    }
}

impl Drop for WireConnection {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

impl Connection for WireConnection {
    fn invoke(&self, call: UploadCall) -> BoxFuture<'_, Result<Bytes>> {
        Box::pin(self.shared.invoke(call))
    }

    fn send(&self, call: UploadCall) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.shared.send(call))
    }
}

impl Shared {
    fn table(&self) -> MutexGuard<'_, CallTable> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u32 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != NO_REPLY_ID {
                return id;
            }
        }
    }

    async fn invoke(self: &Arc<Self>, call: UploadCall) -> Result<Bytes> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();

        {
            let mut table = self.table();
            if table.closed {
                return Err(WireupError::ConnectionClosed);
            }
            table.pending.insert(id, tx);
        }

        let mut guard = CallGuard {
            shared: self.clone(),
            id,
            invoked: false,
            resolved: false,
        };

        let relays = self.start_call(id, call).await?;
        guard.invoked = true;
        let outcome = rx.await.unwrap_or(Err(WireupError::ConnectionClosed));

        guard.resolved = true;
        drop(relays);
        outcome
    }

    async fn send(self: &Arc<Self>, call: UploadCall) -> Result<()> {
        if self.table().closed {
            return Err(WireupError::ConnectionClosed);
        }

        self.start_call(NO_REPLY_ID, call).await?.detach();
        Ok(())
    }

    /// Queue the `Invoke` frame, then start one relay per stream.
    async fn start_call(self: &Arc<Self>, id: u32, call: UploadCall) -> Result<RelaySet> {
        let (target, streams, arguments) = call.into_parts();
        let stream_ids: Vec<u32> = streams.iter().map(|_| self.next_id()).collect();

        tracing::debug!(
            "Invoking {} (invocation {}, streams {:?}, {} args)",
            target,
            id,
            stream_ids,
            arguments.len()
        );

        let invocation = Invocation {
            target,
            arguments,
            stream_ids: stream_ids.clone(),
        };
        let payload = MsgPackCodec::encode_bytes(&invocation)?;
        self.writer
            .send(payload_frame(FrameKind::Invoke, 0, id, payload)?)
            .await?;

        let relays = stream_ids
            .into_iter()
            .zip(streams)
            .map(|(stream_id, items)| tokio::spawn(relay_stream(self.clone(), id, stream_id, items)))
            .collect();

        Ok(RelaySet(relays))
    }

    fn dispatch(&self, frame: Frame) {
        match frame.kind() {
            FrameKind::Completion => {
                let Some(tx) = self.table().pending.remove(&frame.id()) else {
                    tracing::warn!("Completion for unknown invocation {}", frame.id());
                    return;
                };

                let outcome = if frame.is_error() {
                    Err(WireupError::Rpc(error_message(frame.payload())))
                } else {
                    Ok(frame.payload)
                };
                let _ = tx.send(outcome);
            }
            kind => {
                tracing::warn!("Unexpected {:?} frame from remote (id {})", kind, frame.id());
            }
        }
    }

    /// Resolve a pending call with a local failure.
    fn fail_call(&self, id: u32, error: WireupError) {
        if let Some(tx) = self.table().pending.remove(&id) {
            let _ = tx.send(Err(error));
        }
    }

    /// Fail every pending call and refuse new ones.
    fn shut_down(&self) {
        let pending = {
            let mut table = self.table();
            table.closed = true;
            std::mem::take(&mut table.pending)
        };

        for (_, tx) in pending {
            let _ = tx.send(Err(WireupError::ConnectionClosed));
        }
    }
}

/// Withdraws an abandoned invocation, telling the remote once it has seen it.
struct CallGuard {
    shared: Arc<Shared>,
    id: u32,
    invoked: bool,
    resolved: bool,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }

        self.shared.table().pending.remove(&self.id);
        if !self.invoked {
            return;
        }

        let cancel = OutboundFrame::empty(&Header::new(FrameKind::Cancel, 0, self.id, 0));
        if let Err(e) = self.shared.writer.try_send(cancel) {
            tracing::debug!("Could not cancel invocation {}: {}", self.id, e);
        } else {
            tracing::debug!("Invocation {} abandoned, cancel sent", self.id);
        }
    }
}

/// Relay tasks of one call; aborted on drop unless detached.
struct RelaySet(Vec<JoinHandle<()>>);

impl RelaySet {
    fn detach(mut self) {
        self.0.clear();
    }
}

impl Drop for RelaySet {
    fn drop(&mut self) {
        for relay in &self.0 {
            relay.abort();
        }
    }
}

async fn relay_stream(shared: Arc<Shared>, call_id: u32, stream_id: u32, items: ItemStream) {
    if let Err(e) = forward_items(&shared.writer, stream_id, items).await {
        tracing::warn!("Stream {} of invocation {} not delivered: {}", stream_id, call_id, e);
        shared.fail_call(call_id, e);
    }
}

/// Forward every item, then a `StreamComplete`.
///
/// A failing source ends the stream with an errored completion. Only a
/// failure to write is returned.
async fn forward_items(writer: &WriterHandle, stream_id: u32, mut items: ItemStream) -> Result<()> {
    let mut sent = 0;
    let complete = loop {
        let frame = match items.next().await {
            Some(item) => item.and_then(|payload| payload_frame(FrameKind::StreamItem, 0, stream_id, payload)),
            None => {
                tracing::debug!("Stream {} drained after {} items", stream_id, sent);
                break OutboundFrame::empty(&Header::new(FrameKind::StreamComplete, 0, stream_id, 0));
            }
        };

        match frame {
            Ok(frame) => {
                writer.send_wait(frame).await?;
                sent += 1;
            }
            Err(e) => {
                tracing::warn!("Stream {} ended with error: {}", stream_id, e);
                let reason = MsgPackCodec::encode_bytes(&e.to_string())?;
                break payload_frame(FrameKind::StreamComplete, flags::ERROR, stream_id, reason)?;
            }
        }
    };

    writer.send_wait(complete).await
}

fn payload_frame(kind: FrameKind, flags: u8, id: u32, payload: Bytes) -> Result<OutboundFrame> {
    let length = u32::try_from(payload.len()).map_err(|_| {
        WireupError::Protocol(format!("Payload of {} bytes does not fit a frame", payload.len()))
    })?;
    Ok(OutboundFrame::new(&Header::new(kind, flags, id, length), payload))
}

/// Error completions carry a MsgPack string; fall back to raw UTF-8.
fn error_message(payload: &[u8]) -> String {
    MsgPackCodec::decode::<String>(payload).unwrap_or_else(|_| String::from_utf8_lossy(payload).into_owned())
}

async fn read_loop<R>(mut reader: R, shared: Arc<Shared>, max_payload_size: u32, buffer_size: usize)
where
    R: AsyncRead + Unpin,
{
    match pump_frames(&mut reader, &shared, max_payload_size, buffer_size).await {
        Ok(()) => tracing::debug!("Connection closed by remote"),
        Err(e) => tracing::error!("Read loop error: {}", e),
    }
    shared.shut_down();
}

async fn pump_frames<R>(
    reader: &mut R,
    shared: &Shared,
    max_payload_size: u32,
    buffer_size: usize,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut frame_buffer = FrameBuffer::with_max_payload(max_payload_size);
    let mut buf = vec![0u8; buffer_size];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }

        for frame in frame_buffer.push(&buf[..n])? {
            shared.dispatch(frame);
        }
    }
}
