//! Protobuf codec for the length-prefixed binary encoding.
//!
//! The message types live in [`wire`]; they are declared with `prost`
//! derives instead of generated from a `.proto`, so the field tags below are
//! the schema.

use prost::Message;

use super::{Codec, Encoding};
use crate::config::SessionConfig;
use crate::error::{Result, TriwireError};
use crate::message::{flatten_params, Params, ParamValue, Request, RequestKind, Response};
use crate::protocol::LengthPrefixFramer;

/// Protobuf messages exchanged on the binary port.
pub mod wire {
    use std::collections::BTreeMap;

    use prost::Message;

    /// Client to server envelope.
    #[derive(Clone, PartialEq, Message)]
    pub struct Requisicao {
        #[prost(oneof = "requisicao::Conteudo", tags = "1, 2, 3")]
        pub conteudo: Option<requisicao::Conteudo>,
    }

    pub mod requisicao {
        #[derive(Clone, PartialEq, prost::Oneof)]
        pub enum Conteudo {
            #[prost(message, tag = "1")]
            Auth(super::Auth),
            #[prost(message, tag = "2")]
            Operacao(super::Operacao),
            #[prost(message, tag = "3")]
            Logout(super::Logout),
        }
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct Auth {
        #[prost(string, tag = "1")]
        pub aluno_id: String,
        #[prost(string, tag = "2")]
        pub timestamp_cliente: String,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct Operacao {
        #[prost(string, tag = "1")]
        pub token: String,
        #[prost(string, tag = "2")]
        pub operacao: String,
        #[prost(btree_map = "string, string", tag = "3")]
        pub parametros: BTreeMap<String, String>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct Logout {
        #[prost(string, tag = "1")]
        pub token: String,
    }

    /// Server to client envelope.
    #[derive(Clone, PartialEq, Message)]
    pub struct Resposta {
        #[prost(oneof = "resposta::Resultado", tags = "1, 2")]
        pub resultado: Option<resposta::Resultado>,
    }

    pub mod resposta {
        #[derive(Clone, PartialEq, prost::Oneof)]
        pub enum Resultado {
            #[prost(message, tag = "1")]
            Ok(super::RespostaOk),
            #[prost(message, tag = "2")]
            Erro(super::Erro),
        }
    }

    /// Successful result; `ok` on the wire.
    #[derive(Clone, PartialEq, Message)]
    pub struct RespostaOk {
        #[prost(btree_map = "string, string", tag = "1")]
        pub dados: BTreeMap<String, String>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct Erro {
        #[prost(string, tag = "1")]
        pub mensagem: String,
    }
}

use wire::requisicao::Conteudo;
use wire::resposta::Resultado;

/// Codec for the protobuf protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl Codec for BinaryCodec {
    type Framer = LengthPrefixFramer;

    const ENCODING: Encoding = Encoding::Binary;

    fn framer(&self, config: &SessionConfig) -> LengthPrefixFramer {
        LengthPrefixFramer::new(config.max_frame_size)
    }

    fn encode_request(&self, request: &Request) -> Result<Vec<u8>> {
        let conteudo = match request {
            Request::Auth {
                student_id,
                client_timestamp,
            } => Conteudo::Auth(wire::Auth {
                aluno_id: student_id.clone(),
                timestamp_cliente: client_timestamp.clone(),
            }),
            Request::Operation {
                token,
                operation,
                parameters,
            } => Conteudo::Operacao(wire::Operacao {
                token: token.clone(),
                operacao: operation.clone(),
                parametros: flatten_params(parameters),
            }),
            Request::Logout { token } => Conteudo::Logout(wire::Logout {
                token: token.clone(),
            }),
        };

        Ok(wire::Requisicao {
            conteudo: Some(conteudo),
        }
        .encode_to_vec())
    }

    fn decode_response(&self, _kind: RequestKind, body: &[u8]) -> Result<Response> {
        let resposta = wire::Resposta::decode(body)?;
        match resposta.resultado {
            Some(Resultado::Ok(ok)) => Ok(Response::ok(ok.dados)),
            Some(Resultado::Erro(erro)) => Ok(Response::error(erro.mensagem)),
            None => Err(TriwireError::Decode(
                "response has neither ok nor erro set".to_string(),
            )),
        }
    }

    fn decode_request(&self, body: &[u8]) -> Result<Request> {
        let requisicao = wire::Requisicao::decode(body)?;
        match requisicao.conteudo {
            Some(Conteudo::Auth(auth)) => Ok(Request::Auth {
                student_id: auth.aluno_id,
                client_timestamp: auth.timestamp_cliente,
            }),
            Some(Conteudo::Operacao(op)) => Ok(Request::Operation {
                token: op.token,
                operation: op.operacao,
                parameters: op
                    .parametros
                    .into_iter()
                    .map(|(k, v)| (k, ParamValue::Text(v)))
                    .collect::<Params>(),
            }),
            Some(Conteudo::Logout(logout)) => Ok(Request::Logout {
                token: logout.token,
            }),
            None => Err(TriwireError::Decode(
                "request has no variant set".to_string(),
            )),
        }
    }

    fn encode_response(&self, _kind: RequestKind, response: &Response) -> Result<Vec<u8>> {
        let resultado = match response {
            Response::Ok { fields } => Resultado::Ok(wire::RespostaOk {
                dados: fields.clone(),
            }),
            Response::Error { message } => Resultado::Erro(wire::Erro {
                mensagem: message.clone(),
            }),
        };

        Ok(wire::Resposta {
            resultado: Some(resultado),
        }
        .encode_to_vec())
    }
}
