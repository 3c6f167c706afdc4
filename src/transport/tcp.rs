//! TCP transport.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use triwire_client::transport::Transport;
//!
//! let mut transport = Transport::connect("127.0.0.1", 8080, Duration::from_secs(30)).await?;
//! transport.send(b"LOGOUT|token=abc|FIM\n").await?;
//! transport.close().await;
//! ```

use std::io;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Result, TriwireError};

/// Default time allowed to establish the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time allowed for a single send or exact receive.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Bytes requested per read attempt.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Outcome of a single bounded read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunk {
    /// `n` bytes were appended to the caller's buffer.
    Data(usize),
    /// The peer closed its side (zero-byte read).
    Closed,
    /// Nothing arrived before the deadline.
    TimedOut,
}

/// Exclusive owner of one connection.
///
/// Every I/O method fails with [`TriwireError::NotConnected`] once the
/// transport is closed. A failed send or receive closes the transport: with
/// a half-duplex protocol there is no way to resynchronise after a partial
/// exchange.
pub struct Transport<S = TcpStream> {
    stream: Option<S>,
    peer: String,
    io_timeout: Duration,
}

impl Transport<TcpStream> {
    /// Open a TCP connection to `host:port` within `timeout`.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let addr = format!("{host}:{port}");

        let stream = match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(TriwireError::Connect { addr, source }),
            Err(_) => {
                return Err(TriwireError::Connect {
                    addr,
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                })
            }
        };

        // Requests are small and strictly alternating; don't let Nagle hold them.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("set_nodelay failed for {}: {}", addr, e);
        }

        tracing::info!("Connected to {}", addr);
        Ok(Self::from_stream(stream, addr))
    }
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-connected stream. `peer` is only used in logs.
    pub fn from_stream(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream: Some(stream),
            peer: peer.into(),
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// Set the deadline applied to sends and exact receives.
    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    /// Peer label (`host:port` for TCP).
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Whether the connection is still open.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Write all of `bytes` and flush.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(TriwireError::NotConnected)?;

        let write = async {
            stream.write_all(bytes).await?;
            stream.flush().await
        };

        let result = match tokio::time::timeout(self.io_timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "send timed out")),
        };

        match result {
            Ok(()) => {
                tracing::trace!("Sent {} bytes to {}", bytes.len(), self.peer);
                Ok(())
            }
            Err(e) => {
                self.drop_stream("send", &e);
                Err(TriwireError::Write(e))
            }
        }
    }

    /// Read exactly `n` bytes.
    ///
    /// Fails with [`TriwireError::Read`] if the peer closes before `n` bytes
    /// arrive or the I/O timeout elapses.
    pub async fn receive_exact(&mut self, n: usize) -> Result<Bytes> {
        let stream = self.stream.as_mut().ok_or(TriwireError::NotConnected)?;
        if n == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = vec![0u8; n];
        let result = match tokio::time::timeout(self.io_timeout, stream.read_exact(&mut buf)).await
        {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "receive timed out")),
        };

        match result {
            Ok(()) => Ok(Bytes::from(buf)),
            Err(e) => {
                self.drop_stream("receive", &e);
                Err(TriwireError::Read(e))
            }
        }
    }

    /// One read attempt bounded by `deadline`, appending into `buf`.
    ///
    /// A timeout is not an error here; the caller decides what an idle
    /// connection means.
    pub async fn receive_available(&mut self, buf: &mut BytesMut, deadline: Duration) -> Result<Chunk> {
        let stream = self.stream.as_mut().ok_or(TriwireError::NotConnected)?;
        buf.reserve(READ_CHUNK_SIZE);

        match tokio::time::timeout(deadline, stream.read_buf(buf)).await {
            Err(_) => Ok(Chunk::TimedOut),
            Ok(Ok(0)) => Ok(Chunk::Closed),
            Ok(Ok(n)) => Ok(Chunk::Data(n)),
            Ok(Err(e)) => {
                self.drop_stream("receive", &e);
                Err(TriwireError::Read(e))
            }
        }
    }

    /// Shut the connection down. Calling it again is a no-op.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!("Shutdown of {} failed: {}", self.peer, e);
            }
            tracing::info!("Disconnected from {}", self.peer);
        }
    }

    fn drop_stream(&mut self, op: &str, error: &io::Error) {
        tracing::warn!("{} on {} failed, closing connection: {}", op, self.peer, error);
        self.stream = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_and_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(&buf).await.unwrap();
        });

        let mut transport = Transport::connect("127.0.0.1", port, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(transport.peer(), format!("127.0.0.1:{port}"));

        transport.send(b"ping").await.unwrap();
        let echoed = transport.receive_exact(4).await.unwrap();
        assert_eq!(&echoed[..], b"ping");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = Transport::connect("127.0.0.1", port, Duration::from_secs(5)).await;
        let err = result.err().unwrap();
        assert!(matches!(err, TriwireError::Connect { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_receive_exact_across_fragments() {
        let (client, mut server) = duplex(64);
        let mut transport = Transport::from_stream(client, "mem");

        tokio::spawn(async move {
            server.write_all(b"he").await.unwrap();
            tokio::task::yield_now().await;
            server.write_all(b"llo").await.unwrap();
            // Keep the pipe open until the reader is done.
            tokio::time::sleep(Duration::from_millis(50)).await;
        });

        let bytes = transport.receive_exact(5).await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_receive_exact_peer_closed_early() {
        let (client, mut server) = duplex(64);
        let mut transport = Transport::from_stream(client, "mem");

        server.write_all(b"ab").await.unwrap();
        drop(server);

        let err = transport.receive_exact(4).await.unwrap_err();
        assert!(matches!(err, TriwireError::Read(_)));
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_receive_exact_zero_is_immediate() {
        let (client, _server) = duplex(64);
        let mut transport = Transport::from_stream(client, "mem");
        assert!(transport.receive_exact(0).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_exact_times_out() {
        let (client, _server) = duplex(64);
        let mut transport =
            Transport::from_stream(client, "mem").with_io_timeout(Duration::from_secs(3));

        let err = transport.receive_exact(4).await.unwrap_err();
        match err {
            TriwireError::Read(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_available_outcomes() {
        let (client, mut server) = duplex(64);
        let mut transport = Transport::from_stream(client, "mem");
        let mut buf = BytesMut::new();

        let idle = transport
            .receive_available(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(idle, Chunk::TimedOut);
        assert!(buf.is_empty());

        server.write_all(b"OK|FIM\n").await.unwrap();
        let data = transport
            .receive_available(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(data, Chunk::Data(7));
        assert_eq!(&buf[..], b"OK|FIM\n");

        drop(server);
        let closed = transport
            .receive_available(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(closed, Chunk::Closed);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (client, _server) = duplex(64);
        let mut transport = Transport::from_stream(client, "mem");

        transport.close().await;
        transport.close().await;
        assert!(!transport.is_open());

        let err = transport.send(b"x").await.unwrap_err();
        assert!(matches!(err, TriwireError::NotConnected));
    }
}
