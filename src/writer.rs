//! Dedicated writer task for outbound frames.
//!
//! Every in-flight call shares one connection. Invocation frames, stream
//! relays and cancel signals all funnel through a single writer task via an
//! mpsc channel, so no lock guards the socket and ready frames are batched
//! into one vectored write.
//!
//! ```text
//! invoke()        ─┐
//! relay stream 1  ─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► Socket
//! relay stream N  ─┘
//! ```
//!
//! A full channel is the connection-level backpressure. `send` waits for
//! room up to the configured send timeout. Stream relays use `send_wait`,
//! which waits until the socket drains, so a slow remote stalls the relay
//! and, through its pipe, the producer.

use std::io::IoSlice;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, WireupError};
use crate::protocol::{Header, HEADER_SIZE};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default time to wait for room in a full writer channel.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded header.
    pub header: [u8; HEADER_SIZE],
    /// Payload bytes (empty for stream completion and cancel).
    pub payload: Bytes,
}

impl OutboundFrame {
    /// Create a new outbound frame.
    #[inline]
    pub fn new(header: &Header, payload: Bytes) -> Self {
        Self {
            header: header.encode(),
            payload,
        }
    }

    /// Create a new outbound frame with empty payload.
    #[inline]
    pub fn empty(header: &Header) -> Self {
        Self::new(header, Bytes::new())
    }

    /// Total size of this frame (header + payload).
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Channel capacity for frame queue.
    pub channel_capacity: usize,
    /// How long `send` waits while the channel is full.
    pub send_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Handle for sending frames to the writer task.
///
/// Cheaply cloneable; one clone per relay task.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
    send_timeout: Duration,
}

impl WriterHandle {
    /// Queue a frame, waiting while the channel is full.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        let permit = match tokio::time::timeout(self.send_timeout, self.tx.reserve()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(WireupError::ConnectionClosed),
            Err(_) => return Err(WireupError::BackpressureTimeout),
        };

        permit.send(frame);
        Ok(())
    }

    /// Queue a frame, waiting for room with no deadline.
    ///
    /// Fails only once the writer task has stopped.
    pub async fn send_wait(&self, frame: OutboundFrame) -> Result<()> {
        let permit = self.tx.reserve().await.map_err(|_| WireupError::ConnectionClosed)?;
        permit.send(frame);
        Ok(())
    }

    /// Queue a frame without waiting.
    ///
    /// Used from synchronous contexts such as `Drop`.
    pub fn try_send(&self, frame: OutboundFrame) -> Result<()> {
        let permit = self.tx.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => WireupError::BackpressureTimeout,
            mpsc::error::TrySendError::Closed(()) => WireupError::ConnectionClosed,
        })?;

        permit.send(frame);
        Ok(())
    }

    /// Check if the writer task has stopped.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task ends cleanly once every [`WriterHandle`] is dropped, and with
/// an error if the underlying write fails.
pub fn spawn_writer_task<W>(writer: W, config: WriterConfig) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);

    let handle = WriterHandle {
        tx,
        send_timeout: config.send_timeout,
    };

    let task = tokio::spawn(writer_loop(rx, writer));

    (handle, task)
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);

    while let Some(first) = rx.recv().await {
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        let result = write_batch(&mut writer, &batch).await;
        batch.clear();

        if let Err(e) = result {
            tracing::error!("Writer failed: {}", e);
            return Err(e);
        }
    }

    let _ = writer.shutdown().await;
    Ok(())
}

/// Write a batch of frames using scatter/gather I/O, resuming after
/// partial writes.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(OutboundFrame::size).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(WireupError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// IoSlices covering everything after the first `skip_bytes` of the batch.
fn remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut offset = 0;

    for frame in batch {
        for part in [&frame.header[..], &frame.payload[..]] {
            let end = offset + part.len();
            if !part.is_empty() && skip_bytes < end {
                let start = skip_bytes.saturating_sub(offset);
                slices.push(IoSlice::new(&part[start..]));
            }
            offset = end;
        }
    }

    slices
}
