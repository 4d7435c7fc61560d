//! # wireup
//!
//! Client-side streaming uploads: feed remote invocations from local
//! producers over one long-lived connection.
//!
//! ## Architecture
//!
//! - **Stream pipe** ([`pipe`]): bounded or unbounded SPSC queue with close
//! - **Producers** ([`producer`]): tasks that fill a pipe from a source, then close it
//! - **Connection** ([`connection`]): invokes remote methods whose arguments include pipe readers
//! - **Orchestration** ([`Uploader`], [`scenarios`]): pipes, producers and calls wired together
//!
//! ## Example
//!
//! ```ignore
//! use wireup::{connect, iter_source, Pacing, Uploader, UNBOUNDED};
//!
//! #[tokio::main]
//! async fn main() -> wireup::Result<()> {
//!     let uploader = Uploader::new(connect("tcp://127.0.0.1:5000").await?);
//!
//!     let total: i64 = uploader
//!         .upload("Sum", iter_source([1i64, 2, 3]), UNBOUNDED, Pacing::none(), Vec::new())
//!         .await?;
//!     assert_eq!(total, 6);
//!     Ok(())
//! }
//! ```

pub mod call;
pub mod chunk;
pub mod codec;
pub mod connection;
pub mod error;
pub mod pipe;
pub mod producer;
pub mod protocol;
pub mod scenarios;
pub mod transport;
pub mod uploader;
pub mod writer;

pub use call::UploadCall;
pub use chunk::chunk_file;
pub use connection::{connect, Connection, ConnectionBuilder, ConnectionConfig, WireConnection};
pub use error::{Result, WireupError};
pub use pipe::{stream_pipe, PipeReader, PipeWriter, UNBOUNDED};
pub use producer::{iter_source, start_producer, Pacing, ProducerHandle};
pub use uploader::Uploader;
