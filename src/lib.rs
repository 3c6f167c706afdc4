//! # triwire-client
//!
//! Session client for a request/response server reachable over TCP in three
//! interchangeable wire encodings.
//!
//! All three encodings carry the same logical contract: authenticate with a
//! student id, invoke named operations with the issued token, log out.
//!
//! ## Architecture
//!
//! - **Transport** ([`transport`]): one TCP connection, exact reads and
//!   bounded read attempts
//! - **Framing** ([`protocol`]): newline-terminated lines for text and JSON,
//!   a 4-byte big-endian length prefix for binary
//! - **Codecs** ([`codec`]): `TYPE|k=v|...|FIM` text, JSON objects, protobuf
//! - **Session** ([`Session`]): token state and one request/response per call
//!
//! ## Example
//!
//! ```ignore
//! use triwire_client::{codec::BinaryCodec, SessionBuilder};
//!
//! #[tokio::main]
//! async fn main() -> triwire_client::Result<()> {
//!     let mut session = SessionBuilder::new().connect(BinaryCodec).await?;
//!
//!     session.authenticate("554576").await?;
//!     let echoed = session.echo("olá").await?;
//!     println!("{:?}", echoed);
//!
//!     session.logout().await?;
//!     session.close().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod message;
pub mod protocol;
pub mod transport;

mod session;

pub use codec::{BinaryCodec, Codec, Encoding, JsonCodec, TextCodec};
pub use config::SessionConfig;
pub use error::{Result, TriwireError};
pub use message::{Fields, ParamValue, Params, Request, RequestKind, Response, Token};
pub use session::{Session, SessionBuilder, SessionState};
