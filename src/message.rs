//! Logical request/response model shared by every encoding.
//!
//! Codecs translate these values to and from their wire representation;
//! nothing in this module knows about bytes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TriwireError};

/// Result fields returned by the server: always string keys and string values.
pub type Fields = BTreeMap<String, String>;

/// Operation parameters, typed until a codec flattens them.
pub type Params = BTreeMap<String, ParamValue>;

/// A single operation parameter.
///
/// The JSON encoding carries these natively. The text and binary encodings
/// have no numeric types and flatten them with [`ParamValue::to_wire_string`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// String form used by the encodings without native types.
    ///
    /// Lists are joined with `,` so `[15.5, 25.3]` becomes `15.5,25.3`.
    pub fn to_wire_string(&self) -> String {
        match self {
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Integer(i) => i.to_string(),
            ParamValue::Number(n) => number_string(*n),
            ParamValue::Text(s) => s.clone(),
            ParamValue::List(items) => items
                .iter()
                .map(ParamValue::to_wire_string)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Integer(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<&[f64]> for ParamValue {
    fn from(values: &[f64]) -> Self {
        ParamValue::List(values.iter().copied().map(ParamValue::Number).collect())
    }
}

/// Whole numbers keep one decimal (`15.0`), so a float never reads as an
/// integer on the wire.
fn number_string(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 {
        format!("{n:.1}")
    } else {
        n.to_string()
    }
}

/// Flatten typed parameters into the string map carried by text and binary.
pub fn flatten_params(params: &Params) -> Fields {
    params
        .iter()
        .map(|(k, v)| (k.clone(), v.to_wire_string()))
        .collect()
}

/// Which exchange a message belongs to.
///
/// Some encodings shape the response payload differently per exchange
/// (JSON puts auth data under `dados_aluno`), so decoders need to know it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Auth,
    Operation,
    Logout,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestKind::Auth => "auth",
            RequestKind::Operation => "operation",
            RequestKind::Logout => "logout",
        };
        f.write_str(name)
    }
}

/// A request sent to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Exchange a student id for a session token.
    Auth {
        student_id: String,
        client_timestamp: String,
    },
    /// Run a named operation.
    Operation {
        token: String,
        operation: String,
        parameters: Params,
    },
    /// End the session identified by `token`.
    Logout { token: String },
}

impl Request {
    /// Build an auth request stamped with the current local time.
    pub fn auth(student_id: impl Into<String>) -> Self {
        Request::Auth {
            student_id: student_id.into(),
            client_timestamp: client_timestamp(),
        }
    }

    /// The exchange this request starts.
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Auth { .. } => RequestKind::Auth,
            Request::Operation { .. } => RequestKind::Operation,
            Request::Logout { .. } => RequestKind::Logout,
        }
    }
}

/// A response received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ok { fields: Fields },
    Error { message: String },
}

impl Response {
    /// Successful response carrying `fields`.
    pub fn ok(fields: Fields) -> Self {
        Response::Ok { fields }
    }

    /// Error response carrying the server's message.
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok { .. })
    }

    /// Convert to a `Result`, mapping a server error to
    /// [`TriwireError::ServerRejected`].
    pub fn into_result(self) -> Result<Fields> {
        match self {
            Response::Ok { fields } => Ok(fields),
            Response::Error { message } => Err(TriwireError::ServerRejected(message)),
        }
    }
}

/// Opaque credential issued by the server on authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Wrap a server-issued token. Empty strings are not tokens.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({} chars)", self.0.len())
    }
}

/// Local time in ISO-8601 without offset, e.g. `2025-03-01T14:02:11.482913`.
pub fn client_timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}
