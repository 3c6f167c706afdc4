//! Newline-terminated framing for the text and JSON encodings.
//!
//! Neither encoding carries a length, so the end of a message is detected
//! with a bounded polling loop:
//!
//! 1. Read with a short per-attempt deadline.
//! 2. Stop when the buffer holds a `\n` ([`StopReason::LineEnd`]).
//! 3. Stop when the peer closes ([`StopReason::PeerClosed`]).
//! 4. Stop when a read times out after some bytes arrived
//!    ([`StopReason::IdleAfterData`]); the partial buffer is taken as the
//!    whole message.
//! 5. Stop when the attempt budget runs out ([`StopReason::BudgetExhausted`]).
//!
//! As a [`Framer`], silence is reported as
//! [`EmptyResponse`](crate::TriwireError::EmptyResponse) and the connection
//! stays open; a peer that closes without sending anything closes the
//! transport and fails with a fatal read error.
//!
//! Bytes that arrive after the first newline stay buffered and are served
//! by the next [`LineFramer::read_line`] before any new read is attempted.

use std::io;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWrite};

use super::wire_format::{build_line, LINE_TERMINATOR};
use super::Framer;
use crate::config::duration_ms;
use crate::error::{Result, TriwireError};
use crate::transport::{Chunk, Transport};

/// Default number of read attempts per message.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// Default deadline of a single read attempt.
pub const DEFAULT_ATTEMPT_DEADLINE: Duration = Duration::from_secs(2);

/// Polling budget of the line framer.
///
/// Worst case for a silent peer is `max_attempts × attempt_deadline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LinePolicy {
    pub max_attempts: u32,
    #[serde(rename = "attempt_deadline_ms", with = "duration_ms")]
    pub attempt_deadline: Duration,
}

impl LinePolicy {
    /// Longest time a receive can take when nothing ever arrives.
    pub fn worst_case(&self) -> Duration {
        self.attempt_deadline * self.max_attempts
    }
}

impl Default for LinePolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_deadline: DEFAULT_ATTEMPT_DEADLINE,
        }
    }
}

/// Why the polling loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A complete line was already buffered from an earlier read.
    Buffered,
    /// A newline arrived.
    LineEnd,
    /// Zero-byte read: the peer closed its side.
    PeerClosed,
    /// A read timed out after some bytes had arrived.
    IdleAfterData,
    /// Every attempt was used.
    BudgetExhausted,
}

/// Framer for newline-terminated messages.
#[derive(Debug, Default)]
pub struct LineFramer {
    policy: LinePolicy,
    buffer: BytesMut,
}

impl LineFramer {
    pub fn new(policy: LinePolicy) -> Self {
        Self {
            policy,
            buffer: BytesMut::new(),
        }
    }

    pub fn policy(&self) -> &LinePolicy {
        &self.policy
    }

    /// Bytes held over from a previous read.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Read one message, returning it without its terminator together with
    /// the reason the loop stopped.
    ///
    /// An empty message means nothing arrived; it is not an error at this
    /// layer.
    pub async fn read_line<S>(&mut self, transport: &mut Transport<S>) -> Result<(Bytes, StopReason)>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if let Some(line) = self.take_line() {
            return Ok((line, StopReason::Buffered));
        }

        let mut attempts = 0;
        let reason = loop {
            if attempts >= self.policy.max_attempts {
                break StopReason::BudgetExhausted;
            }
            attempts += 1;

            match transport
                .receive_available(&mut self.buffer, self.policy.attempt_deadline)
                .await?
            {
                Chunk::Closed => break StopReason::PeerClosed,
                Chunk::Data(_) if self.buffer.contains(&LINE_TERMINATOR) => {
                    break StopReason::LineEnd
                }
                Chunk::Data(_) => {}
                Chunk::TimedOut if !self.buffer.is_empty() => break StopReason::IdleAfterData,
                Chunk::TimedOut => {}
            }
        };

        let message = match reason {
            StopReason::LineEnd => self.take_line().unwrap_or_default(),
            _ => trim_line_end(self.buffer.split().freeze()),
        };

        tracing::debug!(
            "Line read stopped: {:?} after {} attempt(s), {} bytes, {} held over",
            reason,
            attempts,
            message.len(),
            self.buffer.len()
        );

        Ok((message, reason))
    }

    fn take_line(&mut self) -> Option<Bytes> {
        let pos = self.buffer.iter().position(|&b| b == LINE_TERMINATOR)?;
        let line = self.buffer.split_to(pos + 1).freeze();
        Some(trim_line_end(line))
    }
}

impl Framer for LineFramer {
    fn frame(&self, body: &[u8]) -> Result<Bytes> {
        Ok(build_line(body))
    }

    async fn read_frame<S>(&mut self, transport: &mut Transport<S>) -> Result<Bytes>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (line, reason) = self.read_line(transport).await?;
        if !line.is_empty() {
            return Ok(line);
        }

        if reason == StopReason::PeerClosed {
            transport.close().await;
            return Err(TriwireError::Read(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed the connection before responding",
            )));
        }

        tracing::warn!("No response from {} ({:?})", transport.peer(), reason);
        Err(TriwireError::EmptyResponse)
    }
}

/// Strip trailing `\n` / `\r\n`.
fn trim_line_end(mut line: Bytes) -> Bytes {
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.truncate(line.len() - 1);
    }
    line
}
