//! Lazy file chunking for byte uploads.

use std::path::PathBuf;

use bytes::{Bytes, BytesMut};
use futures::{stream, Stream};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::{Result, WireupError};

/// Default chunk size for file uploads (8 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

enum ChunkState {
    Unopened(PathBuf),
    Reading(File),
    Done,
}

/// Stream the contents of `path` as chunks of exactly `chunk_size` bytes.
///
/// Only the final chunk may be shorter, and it is never empty: a file whose
/// length is an exact multiple of `chunk_size` yields no trailing chunk, and
/// an empty file yields nothing. The file is opened on first poll. After an
/// I/O error is yielded the stream ends.
pub fn chunk_file(
    path: impl Into<PathBuf>,
    chunk_size: usize,
) -> impl Stream<Item = Result<Bytes>> + Send + 'static {
    let initial = if chunk_size == 0 {
        Err(WireupError::InvalidChunkSize(chunk_size))
    } else {
        Ok(ChunkState::Unopened(path.into()))
    };

    stream::unfold(Some(initial), move |state| async move {
        let Some(state) = state else {
            return None;
        };
        let file = match state {
            Err(e) => return Some((Err(e), None)),
            Ok(ChunkState::Done) => return None,
            Ok(ChunkState::Unopened(path)) => match File::open(&path).await {
                Ok(file) => file,
                Err(e) => return Some((Err(e.into()), None)),
            },
            Ok(ChunkState::Reading(file)) => file,
        };

        read_chunk(file, chunk_size).await
    })
}

async fn read_chunk(
    mut file: File,
    chunk_size: usize,
) -> Option<(Result<Bytes>, Option<Result<ChunkState>>)> {
    let mut buf = BytesMut::zeroed(chunk_size);
    let mut filled = 0;

    while filled < chunk_size {
        match file.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) => return Some((Err(e.into()), None)),
        }
    }

    if filled == 0 {
        return None;
    }

    buf.truncate(filled);
    let next = if filled < chunk_size {
        ChunkState::Done
    } else {
        ChunkState::Reading(file)
    };
    Some((Ok(buf.freeze()), Some(Ok(next))))
}
