//! Demo upload variants, each a standalone operation.
//!
//! Method names match the sample hub's streaming endpoints:
//!
//! | Operation | Method | Streams | Scalars | Result |
//! |---|---|---|---|---|
//! | [`sum`] | `Sum` | numbers | - | `i64` |
//! | [`basic_run`] | `UploadWord` | letters | - | `String` |
//! | [`additional_args`] | `UploadWithSuffix` | letters | suffix | `String` |
//! | [`multi_param_invoke`] | `DoubleTrouble` | letters, numbers | - | `String` |
//! | [`basic_send`] | `LocalSum` | numbers | - | none (fire-and-forget) |
//! | [`interleaved_uploads`] | `UploadWord` | letters per message | - | `Vec<String>` |
//! | [`file_upload`] | `UploadFile` | byte chunks | target path | status `String` |

use std::path::PathBuf;

use crate::call::UploadCall;
use crate::chunk::chunk_file;
use crate::connection::Connection;
use crate::error::Result;
use crate::pipe::{stream_pipe, UNBOUNDED};
use crate::producer::{iter_source, start_producer, Pacing, ProducerHandle};
use crate::uploader::Uploader;

/// Adds a stream of integers and returns the total.
pub const SUM: &str = "Sum";
/// Concatenates a stream of strings.
pub const UPLOAD_WORD: &str = "UploadWord";
/// Concatenates a stream of strings, then appends its scalar suffix.
pub const UPLOAD_WITH_SUFFIX: &str = "UploadWithSuffix";
/// Takes a letter stream and a number stream.
pub const DOUBLE_TROUBLE: &str = "DoubleTrouble";
/// Fire-and-forget `Sum`; the total stays on the remote side.
pub const LOCAL_SUM: &str = "LocalSum";
/// Receives byte chunks and stores them under the target name.
pub const UPLOAD_FILE: &str = "UploadFile";

/// Pipe bound used by [`interleaved_uploads`] unless overridden.
pub const DEFAULT_INTERLEAVED_CAPACITY: usize = 2;

/// Split text into one-character strings.
pub fn letters(text: &str) -> Vec<String> {
    text.chars().map(String::from).collect()
}

/// Stream `numbers` into `Sum` and return the remote total.
pub async fn sum<C: Connection>(uploader: &Uploader<C>, numbers: Vec<i64>, pacing: Pacing) -> Result<i64> {
    uploader
        .upload(SUM, iter_source(numbers), UNBOUNDED, pacing, Vec::new())
        .await
}

/// Stream `word` letter by letter into `UploadWord`.
pub async fn basic_run<C: Connection>(uploader: &Uploader<C>, word: &str, pacing: Pacing) -> Result<String> {
    uploader
        .upload(UPLOAD_WORD, iter_source(letters(word)), UNBOUNDED, pacing, Vec::new())
        .await
}

/// Stream `text` into `UploadWithSuffix` alongside a scalar `suffix`.
pub async fn additional_args<C: Connection>(
    uploader: &Uploader<C>,
    text: &str,
    suffix: &str,
    pacing: Pacing,
) -> Result<String> {
    uploader
        .upload(
            UPLOAD_WITH_SUFFIX,
            iter_source(letters(text)),
            UNBOUNDED,
            pacing,
            vec![suffix.into()],
        )
        .await
}

/// Two independently produced streams feeding one `DoubleTrouble` call.
pub async fn multi_param_invoke<C: Connection>(
    uploader: &Uploader<C>,
    text: &str,
    numbers: Vec<i64>,
    pacing: Pacing,
) -> Result<String> {
    let (letter_writer, letter_reader) = stream_pipe(UNBOUNDED);
    let (number_writer, number_reader) = stream_pipe(UNBOUNDED);

    let producers = vec![
        start_producer(iter_source(letters(text)), letter_writer, pacing),
        start_producer(iter_source(numbers), number_writer, pacing),
    ];
    let call = UploadCall::new(DOUBLE_TROUBLE)
        .stream(letter_reader)
        .stream(number_reader);

    uploader.invoke_produced(call, producers).await
}

/// Fire-and-forget `LocalSum`.
///
/// The call is sent before any item exists; the producer only starts
/// afterwards. The remote reports the total on its own side, so the
/// returned handle is the only way to observe the upload finishing.
pub async fn basic_send<C: Connection>(
    uploader: &Uploader<C>,
    numbers: Vec<i64>,
    pacing: Pacing,
) -> Result<ProducerHandle> {
    let (writer, reader) = stream_pipe(UNBOUNDED);
    uploader.send_streaming(LOCAL_SUM, reader, Vec::new()).await?;

    Ok(start_producer(iter_source(numbers), writer, pacing))
}

/// One concurrent `UploadWord` call per message, each over its own
/// bounded pipe.
pub async fn interleaved_uploads<C: Connection>(
    uploader: &Uploader<C>,
    messages: &[&str],
    capacity: usize,
    pacing: Pacing,
) -> Result<Vec<String>> {
    let sources = messages.iter().map(|message| iter_source(letters(message))).collect();

    uploader.run_interleaved(UPLOAD_WORD, sources, capacity, pacing).await
}

/// Stream the file at `source` in `chunk_size` pieces into `UploadFile`.
///
/// `target` is passed through as the remote destination path. Returns the
/// remote's status message.
pub async fn file_upload<C: Connection>(
    uploader: &Uploader<C>,
    source: impl Into<PathBuf>,
    target: &str,
    chunk_size: usize,
    pacing: Pacing,
) -> Result<String> {
    let source = source.into();
    tracing::info!("Uploading {} as {} ({} byte chunks)", source.display(), target, chunk_size);

    uploader
        .upload(
            UPLOAD_FILE,
            chunk_file(source, chunk_size),
            UNBOUNDED,
            pacing,
            vec![target.into()],
        )
        .await
}
