//! Endpoint parsing and platform-specific connect.
//!
//! # Example
//!
//! ```
//! use wireup::transport::Endpoint;
//!
//! let endpoint: Endpoint = "tcp://127.0.0.1:5000".parse().unwrap();
//! assert_eq!(endpoint, Endpoint::Tcp("127.0.0.1:5000".to_string()));
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Result, WireupError};

/// Byte stream a connection can run over.
pub trait Io: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Io for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased connected stream.
pub type BoxedIo = Box<dyn Io>;

/// Where the remote hub listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP `host:port`.
    Tcp(String),
    /// Unix Domain Socket path.
    #[cfg(unix)]
    Unix(std::path::PathBuf),
    /// Windows Named Pipe path.
    #[cfg(windows)]
    NamedPipe(String),
}

impl FromStr for Endpoint {
    type Err = WireupError;

    fn from_str(url: &str) -> Result<Self> {
        if let Some(addr) = url.strip_prefix("tcp://") {
            return parse_tcp(addr);
        }

        if let Some(path) = url.strip_prefix("unix://") {
            return parse_unix(url, path);
        }

        if let Some(path) = url.strip_prefix("pipe://") {
            return parse_named_pipe(path);
        }

        if url.contains("://") {
            return Err(WireupError::Connection(format!("Unsupported endpoint scheme in '{}'", url)));
        }

        parse_tcp(url)
    }
}

#[cfg(unix)]
fn parse_unix(url: &str, path: &str) -> Result<Endpoint> {
    if path.is_empty() {
        return Err(WireupError::Connection(format!("Missing socket path in '{}'", url)));
    }
    Ok(Endpoint::Unix(path.into()))
}

#[cfg(not(unix))]
fn parse_unix(_url: &str, _path: &str) -> Result<Endpoint> {
    Err(WireupError::Connection(
        "Unix sockets are not supported on this platform".to_string(),
    ))
}

#[cfg(windows)]
fn parse_named_pipe(path: &str) -> Result<Endpoint> {
    Ok(Endpoint::NamedPipe(path.to_string()))
}

#[cfg(not(windows))]
fn parse_named_pipe(_path: &str) -> Result<Endpoint> {
    Err(WireupError::Connection(
        "Named pipes are only supported on Windows".to_string(),
    ))
}

fn parse_tcp(addr: &str) -> Result<Endpoint> {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(Endpoint::Tcp(addr.to_string()))
        }
        _ => Err(WireupError::Connection(format!("Expected host:port, got '{}'", addr))),
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
            #[cfg(unix)]
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            #[cfg(windows)]
            Endpoint::NamedPipe(path) => write!(f, "pipe://{}", path),
        }
    }
}

/// Open a byte stream to `endpoint`, failing with
/// [`WireupError::Connection`] on error or after `timeout`.
pub async fn connect_endpoint(endpoint: &Endpoint, timeout: Duration) -> Result<BoxedIo> {
    match tokio::time::timeout(timeout, open(endpoint)).await {
        Ok(Ok(io)) => Ok(io),
        Ok(Err(e)) => Err(WireupError::Connection(format!("{}: {}", endpoint, e))),
        Err(_) => Err(WireupError::Connection(format!(
            "{}: timed out after {:?}",
            endpoint, timeout
        ))),
    }
}

async fn open(endpoint: &Endpoint) -> std::io::Result<BoxedIo> {
    match endpoint {
        Endpoint::Tcp(addr) => {
            let stream = tokio::net::TcpStream::connect(addr.as_str()).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
        #[cfg(unix)]
        Endpoint::Unix(path) => {
            let stream = tokio::net::UnixStream::connect(path).await?;
            Ok(Box::new(stream))
        }
        #[cfg(windows)]
        Endpoint::NamedPipe(path) => {
            let client = tokio::net::windows::named_pipe::ClientOptions::new().open(path)?;
            Ok(Box::new(client))
        }
    }
}
