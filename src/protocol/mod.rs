//! Protocol module - message boundaries per encoding.
//!
//! This module implements framing for the three encodings:
//! - [`LineFramer`]: newline-terminated text and JSON, with the bounded
//!   read-completion heuristic
//! - [`LengthPrefixFramer`]: 4-byte big-endian length prefix for binary
//! - [`FrameBuffer`]: push-based decoder for length-prefixed frames

mod frame_buffer;
mod length_prefix;
mod line;
mod wire_format;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;
use crate::transport::Transport;

pub use frame_buffer::FrameBuffer;
pub use length_prefix::LengthPrefixFramer;
pub use line::{LineFramer, LinePolicy, StopReason, DEFAULT_ATTEMPT_DEADLINE, DEFAULT_MAX_ATTEMPTS};
pub use wire_format::{
    build_frame, build_line, decode_prefix, encode_prefix, validate_frame_len,
    DEFAULT_MAX_FRAME_SIZE, LINE_TERMINATOR, PREFIX_SIZE,
};

/// Message boundary rule of one encoding.
///
/// `frame` turns an encoded body into the bytes put on the wire;
/// `read_frame` reassembles exactly one body from the transport.
#[allow(async_fn_in_trait)]
pub trait Framer {
    /// Wrap an encoded body for sending.
    fn frame(&self, body: &[u8]) -> Result<Bytes>;

    /// Receive one body, without its framing.
    async fn read_frame<S>(&mut self, transport: &mut Transport<S>) -> Result<Bytes>
    where
        S: AsyncRead + AsyncWrite + Unpin;
}
