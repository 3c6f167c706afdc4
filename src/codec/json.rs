//! Newline-delimited JSON codec.
//!
//! Requests are tagged by `tipo`:
//!
//! ```text
//! {"tipo":"autenticar","aluno_id":"554576","timestamp":"2025-03-01T14:02:11.482913"}
//! {"tipo":"operacao","token":"abc123","operacao":"soma","parametros":{"numeros":[15.5,25.3]},"timestamp":"..."}
//! {"tipo":"logout","token":"abc123","timestamp":"..."}
//! ```
//!
//! Responses carry a `sucesso` flag. Success payloads sit under
//! `dados_aluno` (auth, with the token at top level) or `resultado`
//! (operations); failures carry `erro`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{Codec, Encoding};
use crate::config::SessionConfig;
use crate::error::{Result, TriwireError};
use crate::message::{client_timestamp, Fields, Params, Request, RequestKind, Response};
use crate::protocol::LineFramer;

const UNKNOWN_ERROR: &str = "unknown error";

/// Codec for the JSON protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "tipo", rename_all = "lowercase")]
enum WireRequest {
    Autenticar {
        aluno_id: String,
        #[serde(default)]
        timestamp: String,
    },
    Operacao {
        token: String,
        operacao: String,
        #[serde(default)]
        parametros: Params,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    Logout {
        token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
}

impl From<&Request> for WireRequest {
    fn from(request: &Request) -> Self {
        match request {
            Request::Auth {
                student_id,
                client_timestamp,
            } => WireRequest::Autenticar {
                aluno_id: student_id.clone(),
                timestamp: client_timestamp.clone(),
            },
            Request::Operation {
                token,
                operation,
                parameters,
            } => WireRequest::Operacao {
                token: token.clone(),
                operacao: operation.clone(),
                parametros: parameters.clone(),
                timestamp: Some(client_timestamp()),
            },
            Request::Logout { token } => WireRequest::Logout {
                token: token.clone(),
                timestamp: Some(client_timestamp()),
            },
        }
    }
}

impl From<WireRequest> for Request {
    fn from(wire: WireRequest) -> Self {
        match wire {
            WireRequest::Autenticar {
                aluno_id,
                timestamp,
            } => Request::Auth {
                student_id: aluno_id,
                client_timestamp: timestamp,
            },
            WireRequest::Operacao {
                token,
                operacao,
                parametros,
                ..
            } => Request::Operation {
                token,
                operation: operacao,
                parameters: parametros,
            },
            WireRequest::Logout { token, .. } => Request::Logout { token },
        }
    }
}

/// Loose truthiness: `false`, `null`, `0`, `""`, `[]` and `{}` are false.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Strings pass through; anything else becomes its JSON text.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten a payload into fields. Non-object payloads are kept under `key`.
fn payload_fields(key: &str, payload: Option<&Value>, fields: &mut Fields) {
    match payload {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (k, v) in map {
                fields.insert(k.clone(), scalar_string(v));
            }
        }
        Some(other) => {
            fields.insert(key.to_string(), scalar_string(other));
        }
    }
}

fn fields_object<'a, I>(fields: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}

impl Codec for JsonCodec {
    type Framer = LineFramer;

    const ENCODING: Encoding = Encoding::Json;

    fn framer(&self, config: &SessionConfig) -> LineFramer {
        LineFramer::new(config.line)
    }

    fn encode_request(&self, request: &Request) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&WireRequest::from(request))?)
    }

    fn decode_response(&self, kind: RequestKind, body: &[u8]) -> Result<Response> {
        let value: Value = serde_json::from_slice(body)?;
        let Value::Object(object) = value else {
            return Err(TriwireError::Decode(
                "JSON response is not an object".to_string(),
            ));
        };

        if !object.get("sucesso").is_some_and(is_truthy) {
            let message = object
                .get("erro")
                .filter(|v| !v.is_null())
                .map(scalar_string)
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
            return Ok(Response::error(message));
        }

        let mut fields = Fields::new();
        match kind {
            RequestKind::Auth => {
                payload_fields("dados_aluno", object.get("dados_aluno"), &mut fields);
                if let Some(token) = object.get("token").filter(|v| !v.is_null()) {
                    fields.insert("token".to_string(), scalar_string(token));
                }
            }
            RequestKind::Operation => {
                payload_fields("resultado", object.get("resultado"), &mut fields);
            }
            RequestKind::Logout => {
                payload_fields("mensagem", object.get("mensagem"), &mut fields);
            }
        }

        Ok(Response::ok(fields))
    }

    fn decode_request(&self, body: &[u8]) -> Result<Request> {
        let wire: WireRequest = serde_json::from_slice(body)?;
        Ok(wire.into())
    }

    fn encode_response(&self, kind: RequestKind, response: &Response) -> Result<Vec<u8>> {
        let value = match (kind, response) {
            (_, Response::Error { message }) => json!({ "sucesso": false, "erro": message }),
            (RequestKind::Auth, Response::Ok { fields }) => {
                let mut object = Map::new();
                object.insert("sucesso".to_string(), Value::Bool(true));
                if let Some(token) = fields.get("token") {
                    object.insert("token".to_string(), Value::String(token.clone()));
                }
                let student = fields_object(fields.iter().filter(|(k, _)| *k != "token"));
                object.insert("dados_aluno".to_string(), Value::Object(student));
                Value::Object(object)
            }
            (RequestKind::Operation, Response::Ok { fields }) => {
                json!({ "sucesso": true, "resultado": fields_object(fields) })
            }
            (RequestKind::Logout, Response::Ok { fields }) => match fields.get("mensagem") {
                Some(message) => json!({ "sucesso": true, "mensagem": message }),
                None => json!({ "sucesso": true }),
            },
        };
        Ok(serde_json::to_vec(&value)?)
    }
}
