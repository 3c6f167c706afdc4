//! Frame buffer for accumulating partial reads of length-prefixed frames.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForPrefix`: Need at least 4 bytes
//! - `WaitingForBody`: Prefix parsed, need N more body bytes
//!
//! The session reads binary responses with exact reads instead; this buffer
//! serves callers that own their read loop, such as a server accepting
//! binary requests.
//!
//! # Example
//!
//! ```
//! use triwire_client::protocol::{build_frame, FrameBuffer, DEFAULT_MAX_FRAME_SIZE};
//!
//! let mut buffer = FrameBuffer::new();
//! let frame = build_frame(b"body", DEFAULT_MAX_FRAME_SIZE).unwrap();
//!
//! assert!(buffer.push(&frame[..3]).unwrap().is_empty());
//! let bodies = buffer.push(&frame[3..]).unwrap();
//! assert_eq!(&bodies[0][..], b"body");
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{decode_prefix, validate_frame_len, DEFAULT_MAX_FRAME_SIZE, PREFIX_SIZE};
use crate::error::Result;

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for a complete length prefix.
    WaitingForPrefix,
    /// Prefix parsed, waiting for body bytes.
    WaitingForBody { remaining: u32 },
}

/// Buffer for accumulating incoming bytes and extracting complete bodies.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    max_frame_size: u32,
}

impl FrameBuffer {
    /// Create a frame buffer with the default maximum frame size.
    pub fn new() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a frame buffer with a custom maximum frame size.
    pub fn with_max_frame(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            state: State::WaitingForPrefix,
            max_frame_size,
        }
    }

    /// Push data into the buffer and extract all complete bodies.
    ///
    /// Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns [`FrameTooLarge`](crate::TriwireError::FrameTooLarge) if a
    /// prefix announces more than the maximum frame size.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut bodies = Vec::new();
        while let Some(body) = self.try_extract_one()? {
            bodies.push(body);
        }
        Ok(bodies)
    }

    fn try_extract_one(&mut self) -> Result<Option<Bytes>> {
        match self.state {
            State::WaitingForPrefix => {
                let Some(len) = decode_prefix(&self.buffer) else {
                    return Ok(None);
                };
                validate_frame_len(len, self.max_frame_size)?;

                let _ = self.buffer.split_to(PREFIX_SIZE);

                if len == 0 {
                    return Ok(Some(Bytes::new()));
                }

                self.state = State::WaitingForBody { remaining: len };
                self.try_extract_one()
            }

            State::WaitingForBody { remaining } => {
                let remaining = remaining as usize;
                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let body = self.buffer.split_to(remaining).freeze();
                self.state = State::WaitingForPrefix;
                Ok(Some(body))
            }
        }
    }

    /// Number of buffered bytes not yet returned.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForPrefix;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::WaitingForPrefix => "WaitingForPrefix",
            State::WaitingForBody { .. } => "WaitingForBody",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::build_frame;
    use crate::TriwireError;

    fn frame(body: &[u8]) -> Bytes {
        build_frame(body, DEFAULT_MAX_FRAME_SIZE).unwrap()
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let bodies = buffer.push(&frame(b"hello")).unwrap();

        assert_eq!(bodies.len(), 1);
        assert_eq!(&bodies[0][..], b"hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();
        let mut combined = Vec::new();
        combined.extend_from_slice(&frame(b"first"));
        combined.extend_from_slice(&frame(b""));
        combined.extend_from_slice(&frame(b"third"));

        let bodies = buffer.push(&combined).unwrap();

        assert_eq!(bodies.len(), 3);
        assert_eq!(&bodies[0][..], b"first");
        assert!(bodies[1].is_empty());
        assert_eq!(&bodies[2][..], b"third");
    }

    #[test]
    fn test_fragmented_prefix_and_body() {
        let mut buffer = FrameBuffer::new();
        let bytes = frame(b"a longer body that arrives in pieces");

        assert!(buffer.push(&bytes[..2]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPrefix");

        assert!(buffer.push(&bytes[2..PREFIX_SIZE + 3]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForBody");

        let bodies = buffer.push(&bytes[PREFIX_SIZE + 3..]).unwrap();
        assert_eq!(&bodies[0][..], b"a longer body that arrives in pieces");
        assert_eq!(buffer.state_name(), "WaitingForPrefix");
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let mut all = Vec::new();
        for byte in frame(b"hi").iter() {
            all.extend(buffer.push(&[*byte]).unwrap());
        }
        assert_eq!(all.len(), 1);
        assert_eq!(&all[0][..], b"hi");
    }

    #[test]
    fn test_oversize_prefix_rejected() {
        let mut buffer = FrameBuffer::with_max_frame(100);
        let result = buffer.push(&1000u32.to_be_bytes());
        assert!(matches!(
            result,
            Err(TriwireError::FrameTooLarge { len: 1000, max: 100 })
        ));
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        let bytes = frame(b"test");
        buffer.push(&bytes[..PREFIX_SIZE + 1]).unwrap();
        assert_eq!(buffer.state_name(), "WaitingForBody");

        buffer.clear();
        assert_eq!(buffer.state_name(), "WaitingForPrefix");
        assert!(buffer.is_empty());
    }
}
