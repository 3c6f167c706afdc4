//! Pipe-delimited text codec.
//!
//! Every record is `TYPE|key=value|...|FIM`:
//!
//! ```text
//! AUTH|aluno_id=554576|timestamp=2025-03-01T14:02:11.482913|FIM
//! OP|token=abc123|operacao=soma|nums=15.5,25.3|FIM
//! LOGOUT|token=abc123|FIM
//! OK|token=abc123|nome=Maria|FIM
//! ERROR|msg=Token inválido|FIM
//! ```
//!
//! Parsing is lossy but tolerant: segments without `=` are dropped and a
//! response never fails to decode. Values may contain `=` since pairs split
//! on the first one only.

use super::{Codec, Encoding};
use crate::config::SessionConfig;
use crate::error::{Result, TriwireError};
use crate::message::{flatten_params, Fields, ParamValue, Params, Request, RequestKind, Response};
use crate::protocol::LineFramer;

/// Literal closing every record.
pub const TEXT_TERMINATOR: &str = "FIM";

const SEPARATOR: char = '|';

const AUTH: &str = "AUTH";
const OPERATION: &str = "OP";
const LOGOUT: &str = "LOGOUT";
const OK: &str = "OK";
const ERROR: &str = "ERROR";

/// Message used when an error record carries no `msg`.
const UNKNOWN_ERROR: &str = "unknown error";

/// Codec for the pipe-delimited text protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

/// Parse a record into its fields, `tipo` included.
///
/// ```
/// use triwire_client::codec::parse_fields;
///
/// let fields = parse_fields("OK|token=xyz|extra");
/// assert_eq!(fields["tipo"], "OK");
/// assert_eq!(fields["token"], "xyz");
/// assert_eq!(fields.len(), 2);
/// ```
pub fn parse_fields(record: &str) -> Fields {
    let body = record
        .strip_suffix(TEXT_TERMINATOR)
        .and_then(|rest| rest.strip_suffix(SEPARATOR))
        .unwrap_or(record);

    let mut segments = body.split(SEPARATOR);
    let mut fields = Fields::new();

    if let Some(tipo) = segments.next() {
        fields.insert("tipo".to_string(), tipo.to_string());
    }
    for segment in segments {
        if let Some((key, value)) = segment.split_once('=') {
            fields.insert(key.to_string(), value.to_string());
        }
    }

    fields
}

/// Assemble `TYPE|k=v|...|FIM`, refusing pairs that would not parse back.
fn render<'a, I>(record_type: &str, pairs: I) -> Result<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::from(record_type);
    for (key, value) in pairs {
        if key.is_empty() || key.contains(['|', '=', '\n']) {
            return Err(TriwireError::Encode(format!(
                "invalid key for text protocol: {key:?}"
            )));
        }
        if value.contains(['|', '\n']) {
            return Err(TriwireError::Encode(format!(
                "value of {key:?} contains '|' or a newline"
            )));
        }
        out.push(SEPARATOR);
        out.push_str(key);
        out.push('=');
        out.push_str(value);
    }
    out.push(SEPARATOR);
    out.push_str(TEXT_TERMINATOR);
    Ok(out)
}

fn required(fields: &mut Fields, key: &str, record_type: &str) -> Result<String> {
    fields
        .remove(key)
        .ok_or_else(|| TriwireError::Decode(format!("{record_type} record without {key}")))
}

impl Codec for TextCodec {
    type Framer = LineFramer;

    const ENCODING: Encoding = Encoding::Text;

    fn framer(&self, config: &SessionConfig) -> LineFramer {
        LineFramer::new(config.line)
    }

    fn encode_request(&self, request: &Request) -> Result<Vec<u8>> {
        let record = match request {
            Request::Auth {
                student_id,
                client_timestamp,
            } => render(
                AUTH,
                [
                    ("aluno_id", student_id.as_str()),
                    ("timestamp", client_timestamp.as_str()),
                ],
            )?,
            Request::Operation {
                token,
                operation,
                parameters,
            } => {
                if let Some(reserved) = ["token", "operacao"]
                    .into_iter()
                    .find(|k| parameters.contains_key(*k))
                {
                    return Err(TriwireError::Encode(format!(
                        "parameter name {reserved:?} is reserved in the text protocol"
                    )));
                }
                let flat = flatten_params(parameters);
                let head = [("token", token.as_str()), ("operacao", operation.as_str())];
                render(
                    OPERATION,
                    head.into_iter()
                        .chain(flat.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
                )?
            }
            Request::Logout { token } => render(LOGOUT, [("token", token.as_str())])?,
        };
        Ok(record.into_bytes())
    }

    fn decode_response(&self, _kind: RequestKind, body: &[u8]) -> Result<Response> {
        let record = String::from_utf8_lossy(body);
        let mut fields = parse_fields(&record);
        let tipo = fields.remove("tipo").unwrap_or_default();

        if tipo == OK {
            return Ok(Response::ok(fields));
        }

        let message = fields
            .remove("msg")
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
        Ok(Response::error(message))
    }

    fn decode_request(&self, body: &[u8]) -> Result<Request> {
        let record = std::str::from_utf8(body)
            .map_err(|e| TriwireError::Decode(format!("text record is not UTF-8: {e}")))?;
        let mut fields = parse_fields(record);
        let tipo = fields.remove("tipo").unwrap_or_default();

        match tipo.as_str() {
            AUTH => Ok(Request::Auth {
                student_id: required(&mut fields, "aluno_id", AUTH)?,
                client_timestamp: fields.remove("timestamp").unwrap_or_default(),
            }),
            OPERATION => {
                let token = required(&mut fields, "token", OPERATION)?;
                let operation = required(&mut fields, "operacao", OPERATION)?;
                let parameters: Params = fields
                    .into_iter()
                    .map(|(k, v)| (k, ParamValue::Text(v)))
                    .collect();
                Ok(Request::Operation {
                    token,
                    operation,
                    parameters,
                })
            }
            LOGOUT => Ok(Request::Logout {
                token: required(&mut fields, "token", LOGOUT)?,
            }),
            other => Err(TriwireError::Decode(format!(
                "unknown text record type: {other:?}"
            ))),
        }
    }

    fn encode_response(&self, _kind: RequestKind, response: &Response) -> Result<Vec<u8>> {
        let record = match response {
            Response::Ok { fields } => {
                render(OK, fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))?
            }
            Response::Error { message } => render(ERROR, [("msg", message.as_str())])?,
        };
        Ok(record.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_drops_segment_without_equals() {
        let parsed = parse_fields("OK|token=xyz|extra");
        assert_eq!(parsed, fields(&[("tipo", "OK"), ("token", "xyz")]));

        let parsed = parse_fields("OK|badsegment");
        assert_eq!(parsed, fields(&[("tipo", "OK")]));
    }

    #[test]
    fn test_parse_splits_on_first_equals_only() {
        let parsed = parse_fields("OK|hash=a=b==|FIM");
        assert_eq!(parsed["hash"], "a=b==");
    }

    #[test]
    fn test_parse_strips_terminator() {
        let parsed = parse_fields("OK|status=ativo|FIM");
        assert_eq!(parsed, fields(&[("tipo", "OK"), ("status", "ativo")]));
        assert!(!parsed.contains_key("FIM"));
    }

    #[test]
    fn test_encode_auth() {
        let request = Request::Auth {
            student_id: "554576".into(),
            client_timestamp: "2025-03-01T14:02:11.482913".into(),
        };
        let bytes = TextCodec.encode_request(&request).unwrap();
        assert_eq!(
            bytes,
            b"AUTH|aluno_id=554576|timestamp=2025-03-01T14:02:11.482913|FIM"
        );
    }

    #[test]
    fn test_encode_operation_flattens_params() {
        let mut parameters = Params::new();
        let numbers: &[f64] = &[15.5, 25.3];
        parameters.insert("nums".into(), ParamValue::from(numbers));

        let request = Request::Operation {
            token: "abc123".into(),
            operation: "soma".into(),
            parameters,
        };
        let bytes = TextCodec.encode_request(&request).unwrap();
        assert_eq!(bytes, b"OP|token=abc123|operacao=soma|nums=15.5,25.3|FIM");
    }

    #[test]
    fn test_encode_rejects_pipe_in_value() {
        let mut parameters = Params::new();
        parameters.insert("mensagem".into(), ParamValue::from("a|b"));
        let request = Request::Operation {
            token: "t".into(),
            operation: "echo".into(),
            parameters,
        };
        let err = TextCodec.encode_request(&request).unwrap_err();
        assert!(matches!(err, TriwireError::Encode(_)));
    }

    #[test]
    fn test_encode_rejects_reserved_parameter() {
        let mut parameters = Params::new();
        parameters.insert("token".into(), ParamValue::from("other"));
        let request = Request::Operation {
            token: "t".into(),
            operation: "echo".into(),
            parameters,
        };
        assert!(TextCodec.encode_request(&request).is_err());
    }

    #[test]
    fn test_decode_ok_response() {
        let response = TextCodec
            .decode_response(
                RequestKind::Operation,
                b"OK|soma=116.7|media=29.175|maximo=45.2|minimo=15.5|FIM",
            )
            .unwrap();
        assert_eq!(
            response,
            Response::ok(fields(&[
                ("soma", "116.7"),
                ("media", "29.175"),
                ("maximo", "45.2"),
                ("minimo", "15.5"),
            ]))
        );
    }

    #[test]
    fn test_decode_error_response() {
        let response = TextCodec
            .decode_response(RequestKind::Auth, b"ERROR|msg=Matr\xc3\xadcula inv\xc3\xa1lida|FIM")
            .unwrap();
        assert_eq!(response, Response::error("Matrícula inválida"));
    }

    #[test]
    fn test_decode_garbage_is_an_error_response_not_a_failure() {
        let response = TextCodec
            .decode_response(RequestKind::Operation, b"\xff\xfegarbage")
            .unwrap();
        assert_eq!(response, Response::error(UNKNOWN_ERROR));
    }

    #[test]
    fn test_request_round_trip() {
        let mut parameters = Params::new();
        parameters.insert("mensagem".into(), ParamValue::from("olá = mundo"));

        let requests = [
            Request::Auth {
                student_id: "554576".into(),
                client_timestamp: "2025-03-01T14:02:11.482913".into(),
            },
            Request::Operation {
                token: "abc123".into(),
                operation: "echo".into(),
                parameters,
            },
            Request::Logout {
                token: "abc123".into(),
            },
        ];

        for request in requests {
            let bytes = TextCodec.encode_request(&request).unwrap();
            assert_eq!(TextCodec.decode_request(&bytes).unwrap(), request);
        }
    }

    #[test]
    fn test_response_round_trip() {
        let ok = Response::ok(fields(&[("token", "abc123"), ("nome", "Maria")]));
        let bytes = TextCodec.encode_response(RequestKind::Auth, &ok).unwrap();
        assert_eq!(bytes, b"OK|nome=Maria|token=abc123|FIM");
        assert_eq!(TextCodec.decode_response(RequestKind::Auth, &bytes).unwrap(), ok);

        let empty = Response::ok(Fields::new());
        let bytes = TextCodec.encode_response(RequestKind::Logout, &empty).unwrap();
        assert_eq!(bytes, b"OK|FIM");
        assert_eq!(TextCodec.decode_response(RequestKind::Logout, &bytes).unwrap(), empty);

        let err = Response::error("Token inválido");
        let bytes = TextCodec.encode_response(RequestKind::Operation, &err).unwrap();
        assert_eq!(
            TextCodec.decode_response(RequestKind::Operation, &bytes).unwrap(),
            err
        );
    }

    #[test]
    fn test_decode_request_unknown_type() {
        let err = TextCodec.decode_request(b"PING|FIM").unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_decode_request_missing_token() {
        let err = TextCodec.decode_request(b"LOGOUT|FIM").unwrap_err();
        assert!(err.to_string().contains("without token"));
    }
}
