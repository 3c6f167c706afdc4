//! Session configuration.
//!
//! [`SessionConfig`] holds everything needed to open a session: where to
//! connect, how long to wait, and framing limits. Every field has a default,
//! so a config can be built in code or deserialized from a partial JSON
//! document:
//!
//! ```
//! use triwire_client::SessionConfig;
//!
//! let config: SessionConfig = serde_json::from_str(
//!     r#"{"host": "10.0.0.7", "port": 9090, "line": {"max_attempts": 10}}"#,
//! ).unwrap();
//! assert_eq!(config.port, Some(9090));
//! assert_eq!(config.line.max_attempts, 10);
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::codec::Encoding;
use crate::protocol::{LinePolicy, DEFAULT_MAX_FRAME_SIZE};
use crate::transport::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_IO_TIMEOUT};

/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Connection and framing settings for one session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port; `None` uses the encoding's default port.
    pub port: Option<u16>,
    /// Time allowed to establish the connection.
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,
    /// Time allowed for one send or one exact receive.
    #[serde(rename = "io_timeout_ms", with = "duration_ms")]
    pub io_timeout: Duration,
    /// Polling budget of the text/JSON framer.
    pub line: LinePolicy,
    /// Largest binary body accepted or sent.
    pub max_frame_size: u32,
}

impl SessionConfig {
    /// Port to dial for `encoding`.
    pub fn port_for(&self, encoding: Encoding) -> u16 {
        self.port.unwrap_or_else(|| encoding.default_port())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            line: LinePolicy::default(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Serde adapter: `Duration` as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.line.max_attempts, 20);
        assert_eq!(config.line.attempt_deadline, Duration::from_secs(2));
    }

    #[test]
    fn test_port_falls_back_to_encoding_default() {
        let config = SessionConfig::default();
        assert_eq!(config.port_for(Encoding::Text), 8080);
        assert_eq!(config.port_for(Encoding::Json), 8081);
        assert_eq!(config.port_for(Encoding::Binary), 8082);

        let pinned = SessionConfig {
            port: Some(9000),
            ..SessionConfig::default()
        };
        assert_eq!(pinned.port_for(Encoding::Binary), 9000);
    }

    #[test]
    fn test_partial_json() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"connect_timeout_ms": 1500, "max_frame_size": 4096}"#)
                .unwrap();
        assert_eq!(config.connect_timeout, Duration::from_millis(1500));
        assert_eq!(config.io_timeout, DEFAULT_IO_TIMEOUT);
        assert_eq!(config.max_frame_size, 4096);
        assert_eq!(config.host, DEFAULT_HOST);
    }
}
