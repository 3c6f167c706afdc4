//! Length-prefixed framing for the binary encoding.
//!
//! Boundaries are exact by construction: read the 4-byte big-endian prefix,
//! then exactly that many body bytes.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use super::wire_format::{build_frame, decode_prefix, validate_frame_len, DEFAULT_MAX_FRAME_SIZE, PREFIX_SIZE};
use super::Framer;
use crate::error::{Result, TriwireError};
use crate::transport::Transport;

/// Framer for `[u32 BE length][body]` messages.
#[derive(Debug, Clone, Copy)]
pub struct LengthPrefixFramer {
    max_frame_size: u32,
}

impl LengthPrefixFramer {
    pub fn new(max_frame_size: u32) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }
}

impl Default for LengthPrefixFramer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Framer for LengthPrefixFramer {
    fn frame(&self, body: &[u8]) -> Result<Bytes> {
        build_frame(body, self.max_frame_size)
    }

    async fn read_frame<S>(&mut self, transport: &mut Transport<S>) -> Result<Bytes>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let prefix = transport.receive_exact(PREFIX_SIZE).await?;
        let len = decode_prefix(&prefix)
            .ok_or_else(|| TriwireError::Decode("short length prefix".to_string()))?;

        if let Err(e) = validate_frame_len(len, self.max_frame_size) {
            // The body is still in flight; the stream can't be resynchronised.
            transport.close().await;
            return Err(e);
        }

        let body = transport.receive_exact(len as usize).await?;
        tracing::debug!("Read binary frame: {} body bytes", body.len());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;
    use tokio::io::AsyncWriteExt;

    fn fragmented_mock(frame: &[u8], chunk: usize) -> tokio_test::io::Mock {
        let mut builder = tokio_test::io::Builder::new();
        for piece in frame.chunks(chunk) {
            builder.read(piece);
        }
        builder.build()
    }

    #[tokio::test]
    async fn test_reads_exact_body_regardless_of_fragmentation() {
        let body: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
        let frame = build_frame(&body, DEFAULT_MAX_FRAME_SIZE).unwrap();

        for chunk in [1, 3, 4, 5, 1000, 4096, frame.len()] {
            let mut transport = Transport::from_stream(fragmented_mock(&frame, chunk), "mock");
            let read = LengthPrefixFramer::default()
                .read_frame(&mut transport)
                .await
                .unwrap();
            assert_eq!(read.len(), body.len(), "chunk size {chunk}");
            assert_eq!(&read[..], &body[..], "chunk size {chunk}");
        }
    }

    #[tokio::test]
    async fn test_empty_body() {
        let mock = tokio_test::io::Builder::new().read(&[0, 0, 0, 0]).build();
        let mut transport = Transport::from_stream(mock, "mock");

        let body = LengthPrefixFramer::default()
            .read_frame(&mut transport)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_does_not_read_past_frame() {
        let (client, mut server) = duplex(1024);
        let mut transport = Transport::from_stream(client, "mem");
        let mut framer = LengthPrefixFramer::default();

        let mut wire = build_frame(b"one", DEFAULT_MAX_FRAME_SIZE).unwrap().to_vec();
        wire.extend_from_slice(&build_frame(b"two", DEFAULT_MAX_FRAME_SIZE).unwrap());
        server.write_all(&wire).await.unwrap();

        assert_eq!(&framer.read_frame(&mut transport).await.unwrap()[..], b"one");
        assert_eq!(&framer.read_frame(&mut transport).await.unwrap()[..], b"two");
    }

    #[tokio::test]
    async fn test_peer_closed_during_prefix() {
        let (client, mut server) = duplex(64);
        let mut transport = Transport::from_stream(client, "mem");

        server.write_all(&[0, 0]).await.unwrap();
        drop(server);

        let err = LengthPrefixFramer::default()
            .read_frame(&mut transport)
            .await
            .unwrap_err();
        assert!(matches!(err, TriwireError::Read(_)));
    }

    #[tokio::test]
    async fn test_peer_closed_during_body() {
        let (client, mut server) = duplex(64);
        let mut transport = Transport::from_stream(client, "mem");

        server.write_all(&[0, 0, 0, 10, b'a', b'b']).await.unwrap();
        drop(server);

        let err = LengthPrefixFramer::default()
            .read_frame(&mut transport)
            .await
            .unwrap_err();
        assert!(matches!(err, TriwireError::Read(_)));
    }

    #[tokio::test]
    async fn test_oversize_prefix_closes_transport() {
        let mock = tokio_test::io::Builder::new()
            .read(&1_000_000u32.to_be_bytes())
            .build();
        let mut transport = Transport::from_stream(mock, "mock");

        let err = LengthPrefixFramer::new(1024)
            .read_frame(&mut transport)
            .await
            .unwrap_err();
        assert!(matches!(err, TriwireError::FrameTooLarge { .. }));
        assert!(!transport.is_open());
    }

    #[test]
    fn test_frame_prefixes_length() {
        let bytes = LengthPrefixFramer::default().frame(b"abc").unwrap();
        assert_eq!(&bytes[..], &[0, 0, 0, 3, b'a', b'b', b'c']);
    }
}
