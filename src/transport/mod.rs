//! Transport module - endpoint parsing and socket connect.
//!
//! Supported endpoints:
//! - TCP: `tcp://host:port` or bare `host:port`
//! - Unix Domain Sockets (Linux/macOS): `unix:///path/to/hub.sock`
//! - Named Pipes (Windows): `pipe://\\.\pipe\hub`

mod endpoint;

pub use endpoint::{connect_endpoint, BoxedIo, Endpoint, Io};
