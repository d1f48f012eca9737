//! Connection reader: accept one client, read one line, close.
//!
//! Every read shares the run's absolute deadline, so the window for later
//! reads shrinks as the run goes on. A read that is still waiting for a
//! client gives up when shutdown begins; once a client is accepted its
//! line is always read to completion (or until the deadline).

use crate::error::{ReadError, ServerError};
use async_trait::async_trait;
use bytes::BytesMut;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Longest line kept; anything past this is discarded
pub const MAX_LINE_LENGTH: usize = 1024;

/// Source of single-line messages
#[async_trait]
pub trait SkuReader: Send + Sync {
    /// Wait for one message, giving up at `deadline` or, while no client
    /// has been accepted yet, when `cancel` fires.
    async fn read(&self, deadline: Instant, cancel: &CancellationToken)
        -> Result<String, ReadError>;
}

/// Reads one line per TCP connection
pub struct TcpSkuReader {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpSkuReader {
    /// Bind the listening socket. Must be called inside a Tokio runtime.
    pub fn bind(addr: &str, backlog: i32) -> Result<Self, ServerError> {
        let socket_addr = resolve(addr).map_err(|source| ServerError::Resolve {
            addr: addr.to_string(),
            source,
        })?;

        let bind_error = |source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        };
        let std_listener = create_listener(socket_addr, backlog).map_err(bind_error)?;
        let listener = TcpListener::from_std(std_listener).map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        debug!(address = %local_addr, backlog, "Listener bound");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl SkuReader for TcpSkuReader {
    async fn read(
        &self,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<String, ReadError> {
        // A past deadline must not race a pending connection.
        if Instant::now() >= deadline {
            return Err(ReadError::DeadlineExceeded);
        }

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ReadError::Cancelled),
            accepted = timeout_at(deadline, self.listener.accept()) => match accepted {
                Err(_) => return Err(ReadError::DeadlineExceeded),
                Ok(Err(e)) => return Err(ReadError::Fatal(e)),
                Ok(Ok((stream, peer))) => {
                    trace!(peer = %peer, "Accepted connection");
                    stream
                }
            },
        };

        match timeout_at(deadline, read_line(stream)).await {
            Err(_) => Err(ReadError::DeadlineExceeded),
            Ok(result) => result.map_err(ReadError::Connection),
        }
    }
}

fn resolve(addr: &str) -> io::Result<SocketAddr> {
    addr.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "address resolved to nothing")
    })
}

/// Create a non-blocking TCP listener with SO_REUSEADDR.
fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}

/// Read a single line and close the connection.
///
/// At most [`MAX_LINE_LENGTH`] bytes are kept. A multi-byte character cut
/// by the cap is dropped rather than failing the read.
async fn read_line(mut stream: TcpStream) -> io::Result<String> {
    let mut buffer = BytesMut::with_capacity(MAX_LINE_LENGTH);
    let mut truncated = false;

    loop {
        let window = buffer.len().min(MAX_LINE_LENGTH);
        if let Some(pos) = find_line_end(&buffer[..window]) {
            buffer.truncate(pos);
            break;
        }
        if buffer.len() >= MAX_LINE_LENGTH {
            buffer.truncate(MAX_LINE_LENGTH);
            truncated = true;
            break;
        }

        let n = stream.read_buf(&mut buffer).await?;
        if n == 0 {
            if buffer.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before a line was sent",
                ));
            }
            // Unterminated last line
            break;
        }
    }

    let line = match std::str::from_utf8(&buffer) {
        Ok(line) => line,
        Err(e) if truncated && e.error_len().is_none() => {
            std::str::from_utf8(&buffer[..e.valid_up_to()])
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        }
        Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
    };
    Ok(normalize_line(line))
}

/// Find the position of the first `\n`
fn find_line_end(buffer: &[u8]) -> Option<usize> {
    buffer.iter().position(|&b| b == b'\n')
}

/// Drop a trailing `\r` and any leading `'0'` characters.
///
/// Leading zeros have always been stripped by this service; clients rely
/// on it, so `00KASL-3423` is read as `KASL-3423`.
pub fn normalize_line(line: &str) -> String {
    line.strip_suffix('\r')
        .unwrap_or(line)
        .trim_start_matches('0')
        .to_string()
}
