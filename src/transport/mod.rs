//! Transport module - TCP connection ownership and raw byte I/O.
//!
//! Provides:
//! - [`Transport::connect`] for dialing the server with a deadline
//! - exact reads for length-prefixed framing
//! - single bounded read attempts for the line framer's polling loop
//!
//! The transport is generic over any tokio stream so framers and sessions
//! can be driven over in-memory pipes as well as TCP.

mod tcp;

pub use tcp::{Chunk, Transport, DEFAULT_CONNECT_TIMEOUT, DEFAULT_IO_TIMEOUT, READ_CHUNK_SIZE};
