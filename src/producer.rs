//! Producer tasks that fill a stream pipe from a local source.
//!
//! A producer pulls items one at a time from a fallible [`Stream`],
//! enqueues each into its [`PipeWriter`] and closes the pipe when the
//! source is exhausted. The pipe is closed on every exit path:
//!
//! - source exhausted: `close()`
//! - source error: `close_with_error(reason)`, the error is returned from [`ProducerHandle::join`]
//! - reader gone: enqueue fails with `Closed` and the writer is dropped
//! - task aborted or panicked: the writer is dropped with the task

use std::pin::pin;
use std::time::Duration;

use futures::{stream, Stream, StreamExt};
use tokio::task::JoinHandle;

use crate::error::{Result, WireupError};
use crate::pipe::PipeWriter;

/// Simulated arrival schedule for produced items.
///
/// Pacing never affects correctness; consumers accept items at any rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pacing {
    /// Wait once before the first item.
    pub initial_delay: Duration,
    /// Wait between consecutive items (not after the last one).
    pub item_delay: Duration,
}

impl Pacing {
    /// Back-to-back production.
    pub const fn none() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            item_delay: Duration::ZERO,
        }
    }

    /// One item every `delay`.
    pub const fn every(delay: Duration) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            item_delay: delay,
        }
    }

    /// Wait `delay` before producing anything.
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }
}

/// Adapt an infallible iterator into a producer source.
pub fn iter_source<I>(items: I) -> impl Stream<Item = Result<I::Item>> + Send + 'static
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: 'static,
{
    stream::iter(items.into_iter().map(Ok))
}

/// Handle to a running producer task.
#[derive(Debug)]
pub struct ProducerHandle {
    task: JoinHandle<Result<usize>>,
}

impl ProducerHandle {
    /// Wait for the producer and return the number of items it enqueued.
    ///
    /// An aborted producer reports [`WireupError::Closed`].
    pub async fn join(self) -> Result<usize> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(WireupError::Closed),
            Err(e) => Err(WireupError::Source(format!("producer task failed: {}", e))),
        }
    }

    /// Cancel the producer. Its pipe closes once the task is dropped.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Check whether the producer has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn a task that drains `source` into `writer` and then closes it.
pub fn start_producer<S, T>(source: S, writer: PipeWriter<T>, pacing: Pacing) -> ProducerHandle
where
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    ProducerHandle {
        task: tokio::spawn(produce(source, writer, pacing)),
    }
}

async fn produce<S, T>(source: S, mut writer: PipeWriter<T>, pacing: Pacing) -> Result<usize>
where
    S: Stream<Item = Result<T>>,
{
    let mut source = pin!(source);

    if !pacing.initial_delay.is_zero() {
        tokio::time::sleep(pacing.initial_delay).await;
    }

    let mut produced = 0;
    while let Some(next) = source.next().await {
        let item = match next {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!("Producer source failed after {} items: {}", produced, e);
                writer.close_with_error(e.to_string());
                return Err(e);
            }
        };

        if produced > 0 && !pacing.item_delay.is_zero() {
            tokio::time::sleep(pacing.item_delay).await;
        }

        if let Err(e) = writer.enqueue(item).await {
            tracing::debug!("Producer stopped after {} items: {}", produced, e);
            return Err(e);
        }
        produced += 1;
    }

    writer.close();
    tracing::debug!("Producer finished, {} items", produced);
    Ok(produced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::{stream_pipe, UNBOUNDED};
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_produces_all_items_then_closes() {
        let (writer, mut reader) = stream_pipe(UNBOUNDED);
        let handle = start_producer(iter_source([1, 2, 3]), writer, Pacing::none());

        assert_eq!(handle.join().await.unwrap(), 3);
        assert_eq!(reader.dequeue_next().await, Some(1));
        assert_eq!(reader.dequeue_next().await, Some(2));
        assert_eq!(reader.dequeue_next().await, Some(3));
        assert_eq!(reader.dequeue_next().await, None);
        assert!(reader.fault().is_none());
    }

    #[tokio::test]
    async fn test_empty_source_closes_immediately() {
        let (writer, mut reader) = stream_pipe::<String>(UNBOUNDED);
        let handle = start_producer(iter_source(Vec::new()), writer, Pacing::none());

        assert_eq!(reader.dequeue_next().await, None);
        assert_eq!(handle.join().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_delays_between_items_only() {
        let pacing = Pacing::every(Duration::from_millis(100)).with_initial_delay(Duration::from_secs(1));
        let (writer, mut reader) = stream_pipe(UNBOUNDED);
        let start = Instant::now();
        let handle = start_producer(iter_source(["a", "b", "c"]), writer, pacing);

        let mut arrivals = Vec::new();
        while let Some(item) = reader.dequeue_next().await {
            arrivals.push((item, start.elapsed()));
        }
        let closed_at = start.elapsed();

        assert_eq!(handle.join().await.unwrap(), 3);
        let items: Vec<_> = arrivals.iter().map(|(item, _)| *item).collect();
        assert_eq!(items, ["a", "b", "c"]);

        let near = |elapsed: Duration, millis: u64| {
            let expected = Duration::from_millis(millis);
            elapsed >= expected && elapsed < expected + Duration::from_millis(10)
        };
        assert!(near(arrivals[0].1, 1000), "first item at {:?}", arrivals[0].1);
        assert!(near(arrivals[1].1, 1100), "second item at {:?}", arrivals[1].1);
        assert!(near(arrivals[2].1, 1200), "third item at {:?}", arrivals[2].1);
        assert!(near(closed_at, 1200), "closed at {:?}", closed_at);
    }

    #[tokio::test]
    async fn test_source_error_closes_with_fault() {
        let source = stream::iter(vec![
            Ok(1),
            Err(WireupError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"))),
            Ok(2),
        ]);
        let (writer, mut reader) = stream_pipe(UNBOUNDED);
        let handle = start_producer(source, writer, Pacing::none());

        assert!(matches!(handle.join().await, Err(WireupError::Io(_))));
        assert_eq!(reader.dequeue_next().await, Some(1));
        assert_eq!(reader.dequeue_next().await, None);
        assert_eq!(reader.fault(), Some("I/O error: disk"));
    }

    #[tokio::test]
    async fn test_stops_when_reader_dropped() {
        let (writer, reader) = stream_pipe(1);
        drop(reader);

        let handle = start_producer(iter_source(0..), writer, Pacing::none());
        assert!(matches!(handle.join().await, Err(WireupError::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_closes_pipe() {
        let (writer, mut reader) = stream_pipe(UNBOUNDED);
        let handle = start_producer(iter_source(0..), writer, Pacing::every(Duration::from_secs(3600)));

        assert_eq!(reader.dequeue_next().await, Some(0));
        handle.abort();
        assert_eq!(reader.dequeue_next().await, None);
        assert!(matches!(handle.join().await, Err(WireupError::Closed)));
    }
}
