//! Stream pipe - single-producer/single-consumer item queue with close.
//!
//! A stream pipe decouples a local producer from the remote call that
//! consumes its items. The write half ([`PipeWriter`]) is owned by exactly
//! one producer task; the read half ([`PipeReader`]) is handed to the
//! connection as a streaming call argument.
//!
//! # Capacity
//!
//! - `0` ([`UNBOUNDED`]): enqueue never suspends
//! - `N > 0`: at most `N` items are buffered; `enqueue` suspends while full
//!
//! # Closing
//!
//! Closing is one-way. Items enqueued before the close stay readable until
//! drained, then the reader observes end-of-stream (`None`). Dropping the
//! writer closes the pipe, so a producer that panics or is aborted never
//! leaves its consumer waiting.
//!
//! # Example
//!
//! ```
//! use wireup::pipe::stream_pipe;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let (mut writer, mut reader) = stream_pipe::<i32>(2);
//! writer.enqueue(1).await.unwrap();
//! writer.enqueue(2).await.unwrap();
//! writer.close();
//!
//! assert_eq!(reader.dequeue_next().await, Some(1));
//! assert_eq!(reader.dequeue_next().await, Some(2));
//! assert_eq!(reader.dequeue_next().await, None);
//! # });
//! ```

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::error::{Result, WireupError};

/// Capacity value selecting an unbounded pipe.
pub const UNBOUNDED: usize = 0;

/// State visible to both halves.
#[derive(Debug, Default)]
struct Shared {
    /// Items enqueued but not yet dequeued.
    pending: AtomicUsize,
    /// Reason recorded by `close_with_error`.
    fault: OnceLock<String>,
}

enum Sender<T> {
    Bounded(mpsc::Sender<T>),
    Unbounded(mpsc::UnboundedSender<T>),
}

enum Receiver<T> {
    Bounded(mpsc::Receiver<T>),
    Unbounded(mpsc::UnboundedReceiver<T>),
}

/// Create a stream pipe with the given capacity (`0` = unbounded).
pub fn stream_pipe<T>(capacity: usize) -> (PipeWriter<T>, PipeReader<T>) {
    let shared = Arc::new(Shared::default());

    let (tx, rx) = if capacity == UNBOUNDED {
        let (tx, rx) = mpsc::unbounded_channel();
        (Sender::Unbounded(tx), Receiver::Unbounded(rx))
    } else {
        let (tx, rx) = mpsc::channel(capacity);
        (Sender::Bounded(tx), Receiver::Bounded(rx))
    };

    let writer = PipeWriter {
        tx: Some(tx),
        shared: shared.clone(),
        capacity,
    };
    let reader = PipeReader { rx, shared };

    (writer, reader)
}

/// Write half of a stream pipe.
pub struct PipeWriter<T> {
    /// `None` once closed.
    tx: Option<Sender<T>>,
    shared: Arc<Shared>,
    capacity: usize,
}

impl<T> PipeWriter<T> {
    /// Append an item, suspending while a bounded pipe is full.
    ///
    /// Fails with [`WireupError::Closed`] if the pipe was closed or the
    /// reader has been dropped. The item is never silently discarded
    /// on success.
    pub async fn enqueue(&self, item: T) -> Result<()> {
        match self.tx.as_ref().ok_or(WireupError::Closed)? {
            Sender::Bounded(tx) => {
                let permit = tx.reserve().await.map_err(|_| WireupError::Closed)?;
                // Count before the item becomes visible to the reader
                self.shared.pending.fetch_add(1, Ordering::AcqRel);
                permit.send(item);
            }
            Sender::Unbounded(tx) => self.send_unbounded(tx, item)?,
        }
        Ok(())
    }

    /// Append an item without suspending.
    ///
    /// Returns `Err(PipeFull)` immediately if a bounded pipe is at capacity.
    pub fn try_enqueue(&self, item: T) -> Result<()> {
        match self.tx.as_ref().ok_or(WireupError::Closed)? {
            Sender::Bounded(tx) => {
                let permit = tx.try_reserve().map_err(|e| match e {
                    mpsc::error::TrySendError::Full(()) => WireupError::PipeFull,
                    mpsc::error::TrySendError::Closed(()) => WireupError::Closed,
                })?;
                self.shared.pending.fetch_add(1, Ordering::AcqRel);
                permit.send(item);
                Ok(())
            }
            Sender::Unbounded(tx) => self.send_unbounded(tx, item),
        }
    }

    fn send_unbounded(&self, tx: &mpsc::UnboundedSender<T>, item: T) -> Result<()> {
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        if tx.send(item).is_err() {
            self.shared.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(WireupError::Closed);
        }
        Ok(())
    }

    /// Close the pipe. Idempotent.
    ///
    /// A consumer waiting on an empty pipe is woken and observes
    /// end-of-stream once the backlog drains.
    pub fn close(&mut self) {
        self.tx = None;
    }

    /// Close the pipe and record a producer fault for the reader.
    ///
    /// Has no effect on a pipe that is already closed.
    pub fn close_with_error(&mut self, reason: impl Into<String>) {
        if self.tx.is_some() {
            let _ = self.shared.fault.set(reason.into());
            self.close();
        }
    }

    /// Check whether further enqueues will fail.
    pub fn is_closed(&self) -> bool {
        match &self.tx {
            None => true,
            Some(Sender::Bounded(tx)) => tx.is_closed(),
            Some(Sender::Unbounded(tx)) => tx.is_closed(),
        }
    }

    /// Configured bound, `None` for an unbounded pipe.
    pub fn capacity(&self) -> Option<usize> {
        (self.capacity != UNBOUNDED).then_some(self.capacity)
    }

    /// Number of items buffered and not yet dequeued.
    pub fn len(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Check if no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> std::fmt::Debug for PipeWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeWriter")
            .field("capacity", &self.capacity)
            .field("pending", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Read half of a stream pipe.
///
/// Also usable as a [`Stream`] of items.
pub struct PipeReader<T> {
    rx: Receiver<T>,
    shared: Arc<Shared>,
}

impl<T> PipeReader<T> {
    /// Take the next item in FIFO order.
    ///
    /// Suspends while the pipe is empty and open. Returns `None`
    /// (end-of-stream) once the pipe is closed and drained.
    pub async fn dequeue_next(&mut self) -> Option<T> {
        std::future::poll_fn(|cx| self.poll_dequeue(cx)).await
    }

    fn poll_dequeue(&mut self, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let polled = match &mut self.rx {
            Receiver::Bounded(rx) => rx.poll_recv(cx),
            Receiver::Unbounded(rx) => rx.poll_recv(cx),
        };
        if let Poll::Ready(Some(_)) = &polled {
            self.shared.pending.fetch_sub(1, Ordering::AcqRel);
        }
        polled
    }

    /// Producer fault recorded via [`PipeWriter::close_with_error`].
    pub fn fault(&self) -> Option<&str> {
        self.shared.fault.get().map(String::as_str)
    }

    /// Number of items buffered and not yet dequeued.
    pub fn len(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Check if no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Stream for PipeReader<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().poll_dequeue(cx)
    }
}

impl<T> std::fmt::Debug for PipeReader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeReader")
            .field("pending", &self.len())
            .field("fault", &self.fault())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_then_end_of_stream() {
        let (mut writer, mut reader) = stream_pipe::<i32>(UNBOUNDED);

        for i in [1, 2, 3] {
            writer.enqueue(i).await.unwrap();
        }
        writer.close();

        assert_eq!(reader.dequeue_next().await, Some(1));
        assert_eq!(reader.dequeue_next().await, Some(2));
        assert_eq!(reader.dequeue_next().await, Some(3));
        assert_eq!(reader.dequeue_next().await, None);
        // End-of-stream is sticky
        assert_eq!(reader.dequeue_next().await, None);
    }

    #[tokio::test]
    async fn test_empty_closed_pipe_yields_none_immediately() {
        let (mut writer, mut reader) = stream_pipe::<String>(UNBOUNDED);
        writer.close();

        let next = tokio::time::timeout(Duration::from_millis(100), reader.dequeue_next())
            .await
            .expect("must not suspend on a closed, empty pipe");
        assert_eq!(next, None);
    }

    #[tokio::test]
    async fn test_enqueue_after_close_fails() {
        let (mut writer, mut reader) = stream_pipe::<i32>(4);

        writer.enqueue(7).await.unwrap();
        writer.close();

        assert!(matches!(writer.enqueue(8).await, Err(WireupError::Closed)));
        assert!(matches!(writer.try_enqueue(9), Err(WireupError::Closed)));

        // Already enqueued item is intact
        assert_eq!(reader.dequeue_next().await, Some(7));
        assert_eq!(reader.dequeue_next().await, None);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut writer, mut reader) = stream_pipe::<i32>(UNBOUNDED);
        writer.close();
        writer.close();
        assert!(writer.is_closed());
        assert_eq!(reader.dequeue_next().await, None);
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_consumer() {
        let (mut writer, mut reader) = stream_pipe::<i32>(UNBOUNDED);

        let consumer = tokio::spawn(async move { reader.dequeue_next().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        writer.close();

        assert_eq!(consumer.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dropping_writer_closes_pipe() {
        let (writer, mut reader) = stream_pipe::<i32>(2);
        writer.try_enqueue(5).unwrap();
        drop(writer);

        assert_eq!(reader.dequeue_next().await, Some(5));
        assert_eq!(reader.dequeue_next().await, None);
    }

    #[tokio::test]
    async fn test_bounded_enqueue_suspends_at_capacity() {
        let (writer, mut reader) = stream_pipe::<i32>(2);

        writer.enqueue(1).await.unwrap();
        writer.enqueue(2).await.unwrap();
        assert_eq!(writer.len(), 2);

        // Full: third enqueue must not complete
        let blocked = tokio::time::timeout(Duration::from_millis(20), writer.enqueue(3)).await;
        assert!(blocked.is_err());
        assert_eq!(writer.len(), 2);

        // Dequeue frees a slot
        assert_eq!(reader.dequeue_next().await, Some(1));
        writer.enqueue(3).await.unwrap();
        assert_eq!(writer.len(), 2);

        assert_eq!(reader.dequeue_next().await, Some(2));
        assert_eq!(reader.dequeue_next().await, Some(3));
    }

    #[tokio::test]
    async fn test_blocked_producer_resumes_after_dequeue() {
        let (mut writer, mut reader) = stream_pipe::<i32>(1);

        let producer = tokio::spawn(async move {
            for i in 0..5 {
                writer.enqueue(i).await.unwrap();
                assert!(writer.len() <= 1);
            }
            writer.close();
        });

        let mut seen = Vec::new();
        while let Some(item) = reader.dequeue_next().await {
            seen.push(item);
        }
        producer.await.unwrap();

        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_try_enqueue_full() {
        let (writer, _reader) = stream_pipe::<i32>(1);

        writer.try_enqueue(1).unwrap();
        assert!(matches!(writer.try_enqueue(2), Err(WireupError::PipeFull)));
    }

    #[tokio::test]
    async fn test_reader_dropped_signals_closed() {
        let (writer, reader) = stream_pipe::<i32>(1);
        writer.enqueue(1).await.unwrap();

        // Blocked producer is released when the consumer goes away
        let blocked = tokio::spawn(async move {
            let result = writer.enqueue(2).await;
            (result, writer.is_closed())
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(reader);

        let (result, closed) = blocked.await.unwrap();
        assert!(matches!(result, Err(WireupError::Closed)));
        assert!(closed);
    }

    #[tokio::test]
    async fn test_unbounded_reader_dropped_signals_closed() {
        let (writer, reader) = stream_pipe::<i32>(UNBOUNDED);
        drop(reader);
        assert!(matches!(writer.enqueue(1).await, Err(WireupError::Closed)));
        assert_eq!(writer.len(), 0);
    }

    #[tokio::test]
    async fn test_close_with_error_visible_after_drain() {
        let (mut writer, mut reader) = stream_pipe::<i32>(UNBOUNDED);
        writer.enqueue(1).await.unwrap();
        writer.close_with_error("disk went away");

        assert_eq!(reader.dequeue_next().await, Some(1));
        assert_eq!(reader.dequeue_next().await, None);
        assert_eq!(reader.fault(), Some("disk went away"));
    }

    #[tokio::test]
    async fn test_close_with_error_after_clean_close_is_ignored() {
        let (mut writer, reader) = stream_pipe::<i32>(UNBOUNDED);
        writer.close();
        writer.close_with_error("late");
        assert_eq!(reader.fault(), None);
    }

    #[tokio::test]
    async fn test_reader_as_stream() {
        let (mut writer, reader) = stream_pipe::<&'static str>(UNBOUNDED);
        for s in ["h", "i", "!"] {
            writer.enqueue(s).await.unwrap();
        }
        writer.close();

        let collected: Vec<_> = reader.collect().await;
        assert_eq!(collected, vec!["h", "i", "!"]);
    }

    #[test]
    fn test_capacity_reporting() {
        let (unbounded, _r1) = stream_pipe::<u8>(UNBOUNDED);
        let (bounded, _r2) = stream_pipe::<u8>(8);

        assert_eq!(unbounded.capacity(), None);
        assert_eq!(bounded.capacity(), Some(8));
        assert!(bounded.is_empty());
    }
}
