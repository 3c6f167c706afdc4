//! Wire format constants and the binary length prefix.
//!
//! Binary frames:
//! ```text
//! ┌──────────────┬──────────────────────────┐
//! │ Length       │ Body (protobuf)          │
//! │ 4 bytes      │ Length bytes             │
//! │ uint32 BE    │                          │
//! └──────────────┴──────────────────────────┘
//! ```
//!
//! Text and JSON frames are the body followed by a single `\n`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, TriwireError};

/// Length prefix size in bytes (fixed, exactly 4).
pub const PREFIX_SIZE: usize = 4;

/// Default maximum binary body size (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Terminator of text and JSON messages.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Encode a body length as a big-endian prefix.
///
/// # Example
///
/// ```
/// use triwire_client::protocol::encode_prefix;
///
/// assert_eq!(encode_prefix(0x0102_0304), [1, 2, 3, 4]);
/// ```
#[inline]
pub fn encode_prefix(len: u32) -> [u8; PREFIX_SIZE] {
    len.to_be_bytes()
}

/// Decode a big-endian length prefix.
///
/// Returns `None` if the buffer is shorter than [`PREFIX_SIZE`].
#[inline]
pub fn decode_prefix(buf: &[u8]) -> Option<u32> {
    let prefix: [u8; PREFIX_SIZE] = buf.get(..PREFIX_SIZE)?.try_into().ok()?;
    Some(u32::from_be_bytes(prefix))
}

/// Reject lengths above `max_frame_size`.
pub fn validate_frame_len(len: u32, max_frame_size: u32) -> Result<()> {
    if len > max_frame_size {
        return Err(TriwireError::FrameTooLarge {
            len,
            max: max_frame_size,
        });
    }
    Ok(())
}

/// Build a complete length-prefixed frame as one contiguous buffer.
///
/// Prefix and body go out in a single transport send.
pub fn build_frame(body: &[u8], max_frame_size: u32) -> Result<Bytes> {
    let len = u32::try_from(body.len()).map_err(|_| TriwireError::FrameTooLarge {
        len: u32::MAX,
        max: max_frame_size,
    })?;
    validate_frame_len(len, max_frame_size)?;

    let mut buf = BytesMut::with_capacity(PREFIX_SIZE + body.len());
    buf.put_slice(&encode_prefix(len));
    buf.put_slice(body);
    Ok(buf.freeze())
}

/// Build a newline-terminated frame.
pub fn build_line(body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(body.len() + 1);
    buf.put_slice(body);
    buf.put_u8(LINE_TERMINATOR);
    buf.freeze()
}
