//! Codec module - logical messages to and from each wire encoding.
//!
//! This module provides one codec per encoding:
//!
//! - [`TextCodec`] - pipe-delimited `TYPE|key=value|...|FIM` lines
//! - [`JsonCodec`] - one compact JSON object per line
//! - [`BinaryCodec`] - protobuf tagged unions behind a length prefix
//!
//! # Design
//!
//! Codecs are unit structs. Each one names the [`Framer`] it travels with,
//! so a [`Session`](crate::Session) is fully determined by its codec type.
//! Both directions are implemented for every codec: the client side
//! (`encode_request` / `decode_response`) and the server side
//! (`decode_request` / `encode_response`).
//!
//! # Example
//!
//! ```
//! use triwire_client::codec::{Codec, TextCodec};
//! use triwire_client::{RequestKind, Response};
//!
//! let response = TextCodec
//!     .decode_response(RequestKind::Auth, b"OK|token=abc123|nome=Maria|FIM")
//!     .unwrap();
//! let fields = response.into_result().unwrap();
//! assert_eq!(fields["token"], "abc123");
//! ```

mod binary;
mod json;
mod text;

use std::fmt;
use std::str::FromStr;

use crate::config::SessionConfig;
use crate::error::{Result, TriwireError};
use crate::message::{Request, RequestKind, Response};
use crate::protocol::Framer;

pub use binary::{wire as proto, BinaryCodec};
pub use json::JsonCodec;
pub use text::{parse_fields, TextCodec, TEXT_TERMINATOR};

/// The three wire encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Text,
    Json,
    Binary,
}

impl Encoding {
    /// Port each encoding listens on in the reference deployment.
    pub const fn default_port(self) -> u16 {
        match self {
            Encoding::Text => 8080,
            Encoding::Json => 8081,
            Encoding::Binary => 8082,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Encoding::Text => "text",
            Encoding::Json => "json",
            Encoding::Binary => "binary",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = TriwireError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "strings" => Ok(Encoding::Text),
            "json" => Ok(Encoding::Json),
            "binary" | "protobuf" => Ok(Encoding::Binary),
            other => Err(TriwireError::Protocol(format!("unknown encoding: {other}"))),
        }
    }
}

/// Translation between logical messages and one wire encoding.
pub trait Codec {
    /// Framer paired with this encoding.
    type Framer: Framer;

    /// Which encoding this codec implements.
    const ENCODING: Encoding;

    /// Build the framer for this encoding from session settings.
    fn framer(&self, config: &SessionConfig) -> Self::Framer;

    /// Client side: request to body bytes (without framing).
    fn encode_request(&self, request: &Request) -> Result<Vec<u8>>;

    /// Client side: body bytes to response. `kind` is the exchange the
    /// response answers.
    fn decode_response(&self, kind: RequestKind, body: &[u8]) -> Result<Response>;

    /// Server side: body bytes to request.
    fn decode_request(&self, body: &[u8]) -> Result<Request>;

    /// Server side: response to body bytes.
    fn encode_response(&self, kind: RequestKind, response: &Response) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_from_str() {
        assert_eq!("JSON".parse::<Encoding>().unwrap(), Encoding::Json);
        assert_eq!("protobuf".parse::<Encoding>().unwrap(), Encoding::Binary);
        assert_eq!("strings".parse::<Encoding>().unwrap(), Encoding::Text);
        assert!("xml".parse::<Encoding>().is_err());
    }

    #[test]
    fn test_codec_encodings() {
        assert_eq!(TextCodec::ENCODING, Encoding::Text);
        assert_eq!(JsonCodec::ENCODING, Encoding::Json);
        assert_eq!(BinaryCodec::ENCODING, Encoding::Binary);
        assert_eq!(Encoding::Binary.to_string(), "binary");
    }
}
