//! Session builder and protocol state machine.
//!
//! The [`SessionBuilder`] provides a fluent API for connection settings and
//! opens the connection. The [`Session`] then drives the protocol:
//! 1. Authenticate with a student id and keep the issued token
//! 2. Invoke named operations with that token
//! 3. Log out, which forgets the token
//!
//! Every call is one request followed by one response. Methods take
//! `&mut self`, so a session cannot be used from two places at once.
//!
//! # Example
//!
//! ```ignore
//! use triwire_client::{codec::JsonCodec, SessionBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = SessionBuilder::new()
//!         .host("127.0.0.1")
//!         .connect(JsonCodec)
//!         .await?;
//!
//!     let student = session.authenticate("554576").await?;
//!     println!("hello {}", student["nome"]);
//!
//!     let totals = session.soma(&[15.5, 25.3, 30.7, 45.2]).await?;
//!     println!("soma = {}", totals["soma"]);
//!
//!     session.logout().await?;
//!     session.close().await;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::codec::{Codec, Encoding};
use crate::config::SessionConfig;
use crate::error::{Result, TriwireError};
use crate::message::{Fields, ParamValue, Params, Request, RequestKind, Response, Token};
use crate::protocol::{Framer, LinePolicy};
use crate::transport::Transport;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The transport is closed.
    Disconnected,
    /// Connected, no token held.
    Connected,
    /// Connected with a token.
    Authenticated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::Authenticated => "authenticated",
        };
        f.write_str(name)
    }
}

/// Builder for configuring and opening a session.
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Set the server host.
    ///
    /// Default: `127.0.0.1`
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port.
    ///
    /// Default: the encoding's port (8080 text, 8081 JSON, 8082 binary)
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    /// Set the connect timeout.
    ///
    /// Default: 30 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the timeout of a single send or exact receive.
    ///
    /// Default: 30 seconds
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Set the polling budget used by the text and JSON encodings.
    ///
    /// Default: 20 attempts of 2 seconds
    pub fn line_policy(mut self, policy: LinePolicy) -> Self {
        self.config.line = policy;
        self
    }

    /// Set the largest binary frame accepted or sent.
    ///
    /// Default: 16 MiB
    pub fn max_frame_size(mut self, max: u32) -> Self {
        self.config.max_frame_size = max;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connect to the server and return a session speaking `codec`'s
    /// encoding.
    pub async fn connect<C: Codec>(self, codec: C) -> Result<Session<C>> {
        let port = self.config.port_for(C::ENCODING);
        tracing::debug!(
            "Opening {} session to {}:{}",
            C::ENCODING,
            self.config.host,
            port
        );

        let transport = Transport::connect(&self.config.host, port, self.config.connect_timeout)
            .await?
            .with_io_timeout(self.config.io_timeout);

        Ok(Session::new(transport, codec, &self.config))
    }
}

/// A connected protocol session.
///
/// Owns the transport, the encoding's codec and framer, and the token once
/// authenticated.
pub struct Session<C: Codec, S = TcpStream> {
    transport: Transport<S>,
    codec: C,
    framer: C::Framer,
    token: Option<Token>,
}

impl<C, S> Session<C, S>
where
    C: Codec,
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an open transport.
    pub fn new(transport: Transport<S>, codec: C, config: &SessionConfig) -> Self {
        let framer = codec.framer(config);
        Self {
            transport,
            codec,
            framer,
            token: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if !self.transport.is_open() {
            SessionState::Disconnected
        } else if self.token.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Connected
        }
    }

    #[inline]
    pub fn encoding(&self) -> Encoding {
        C::ENCODING
    }

    /// Token issued by the last successful authentication.
    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    #[inline]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Authenticate as `student_id`.
    ///
    /// On success the token is stored and the server's fields (token
    /// included) are returned. A rejection leaves any previous state as it
    /// was. Never retried.
    pub async fn authenticate(&mut self, student_id: &str) -> Result<Fields> {
        let response = self.exchange(&Request::auth(student_id)).await?;
        let fields = self.accept(RequestKind::Auth, response)?;

        let token = fields
            .get("token")
            .cloned()
            .and_then(Token::new)
            .ok_or_else(|| {
                TriwireError::Protocol("authentication succeeded without a token".to_string())
            })?;

        self.token = Some(token);
        tracing::info!("Authenticated as {} on {}", student_id, self.transport.peer());
        Ok(fields)
    }

    /// Run `operation` with `parameters` and return its result fields.
    pub async fn invoke(&mut self, operation: &str, parameters: Params) -> Result<Fields> {
        let token = self.token.as_ref().ok_or(TriwireError::NotAuthenticated)?;
        let request = Request::Operation {
            token: token.as_str().to_string(),
            operation: operation.to_string(),
            parameters,
        };

        let response = self.exchange(&request).await?;
        self.accept(RequestKind::Operation, response)
    }

    /// End the server-side session.
    ///
    /// Returns `Ok(false)` without any I/O when not authenticated. The token
    /// is kept if the server rejects the logout.
    pub async fn logout(&mut self) -> Result<bool> {
        let Some(token) = self.token.as_ref() else {
            return Ok(false);
        };
        let request = Request::Logout {
            token: token.as_str().to_string(),
        };

        let response = self.exchange(&request).await?;
        self.accept(RequestKind::Logout, response)?;

        self.token = None;
        tracing::info!("Logged out from {}", self.transport.peer());
        Ok(true)
    }

    /// Forget the token without telling the server.
    pub fn reset(&mut self) {
        if self.token.take().is_some() {
            tracing::debug!("Session token cleared locally");
        }
    }

    /// Close the connection. The token is dropped with it.
    pub async fn close(&mut self) {
        self.token = None;
        self.transport.close().await;
    }

    /// `echo`: the server returns `mensagem` back.
    pub async fn echo(&mut self, message: &str) -> Result<Fields> {
        let mut params = Params::new();
        params.insert("mensagem".to_string(), ParamValue::from(message));
        self.invoke("echo", params).await
    }

    /// `soma`: sum, mean, maximum and minimum of `numbers`.
    pub async fn soma(&mut self, numbers: &[f64]) -> Result<Fields> {
        // The text server reads the list from `nums`.
        let key = match C::ENCODING {
            Encoding::Text => "nums",
            Encoding::Json | Encoding::Binary => "numeros",
        };
        let mut params = Params::new();
        params.insert(key.to_string(), ParamValue::from(numbers));
        self.invoke("soma", params).await
    }

    /// `timestamp`: server clock.
    pub async fn timestamp(&mut self) -> Result<Fields> {
        self.invoke("timestamp", Params::new()).await
    }

    /// `status`: server status, with extra detail when `detailed`.
    pub async fn status(&mut self, detailed: bool) -> Result<Fields> {
        let mut params = Params::new();
        // The text server treats any `detalhado` value as set.
        if detailed || C::ENCODING != Encoding::Text {
            params.insert("detalhado".to_string(), ParamValue::from(detailed));
        }
        self.invoke("status", params).await
    }

    /// `historico`: the last `limit` operations of this student.
    pub async fn historico(&mut self, limit: u32) -> Result<Fields> {
        let mut params = Params::new();
        params.insert("limite".to_string(), ParamValue::from(limit));
        self.invoke("historico", params).await
    }

    /// One request, one response.
    async fn exchange(&mut self, request: &Request) -> Result<Response> {
        let kind = request.kind();
        let body = self.codec.encode_request(request)?;
        let frame = self.framer.frame(&body)?;

        tracing::debug!("Sending {} {} request: {} bytes", C::ENCODING, kind, frame.len());
        self.transport.send(&frame).await?;

        let reply = self.framer.read_frame(&mut self.transport).await?;
        tracing::debug!("Received {} {} response: {} bytes", C::ENCODING, kind, reply.len());

        self.codec.decode_response(kind, &reply)
    }

    fn accept(&self, kind: RequestKind, response: Response) -> Result<Fields> {
        response.into_result().map_err(|e| {
            tracing::warn!("{} request rejected: {}", kind, e);
            e
        })
    }
}

impl<C: Codec, S> fmt::Debug for Session<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("encoding", &C::ENCODING)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}
