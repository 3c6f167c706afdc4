//! Error types for triwire-client.

use std::io;

use thiserror::Error;

/// Main error type for all session, framing and codec operations.
#[derive(Debug, Error)]
pub enum TriwireError {
    /// The TCP connection could not be established (refused, unreachable,
    /// or the connect timeout elapsed).
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// `host:port` that was dialed.
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Writing to the connection failed (reset, broken pipe, I/O timeout).
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// Reading from the connection failed (peer closed early, I/O timeout).
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// I/O was attempted after the transport was closed.
    #[error("not connected")]
    NotConnected,

    /// JSON payload could not be parsed or produced.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protobuf payload could not be parsed.
    #[error("protobuf decode error: {0}")]
    Protobuf(#[from] prost::DecodeError),

    /// Payload parsed but does not have the shape of a message.
    #[error("decode error: {0}")]
    Decode(String),

    /// A request value cannot be represented in the chosen encoding
    /// (e.g. a `|` inside a text-protocol value).
    #[error("encode error: {0}")]
    Encode(String),

    /// A length prefix announced a body larger than the configured maximum.
    #[error("frame of {len} bytes exceeds maximum {max}")]
    FrameTooLarge { len: u32, max: u32 },

    /// The line framer gave up without receiving a single byte.
    #[error("empty response from server")]
    EmptyResponse,

    /// An operation or logout needs a token but none is held.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The server answered with an error; the message is passed through verbatim.
    #[error("server rejected request: {0}")]
    ServerRejected(String),

    /// Well-formed response that breaks the session contract.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TriwireError {
    /// Whether the connection is unusable after this error.
    ///
    /// Fatal errors are never retried by this crate; the caller tears the
    /// session down.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TriwireError::Connect { .. }
                | TriwireError::Write(_)
                | TriwireError::Read(_)
                | TriwireError::NotConnected
        )
    }

    /// Whether this error came from a malformed JSON or binary payload.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            TriwireError::Json(_) | TriwireError::Protobuf(_) | TriwireError::Decode(_)
        )
    }
}

/// Result type alias using TriwireError.
pub type Result<T> = std::result::Result<T, TriwireError>;
