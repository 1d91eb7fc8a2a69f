//! Line codec for the protocol.
//!
//! Every message is a single-line JSON object. The shape is chosen by
//! field precedence: `method` means Request, then `success` means
//! Response, then `event` means Event.

use crate::ipc::{EventMessage, Message, Request, Response, WireResponse};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Which message shape a malformed line was recognised as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
    Event,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Request => "request",
            MessageKind::Response => "response",
            MessageKind::Event => "event",
        };
        f.write_str(name)
    }
}

/// Errors decoding one protocol line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("DecodeError: invalid JSON: {0}")]
    Syntax(String),

    #[error("DecodeError: expected a JSON object")]
    NotAnObject,

    #[error("DecodeError: no method, success or event field")]
    UnknownShape,

    #[error("DecodeError: malformed {kind}: {reason}")]
    Malformed {
        kind: MessageKind,
        id: Option<String>,
        reason: String,
    },
}

impl DecodeError {
    /// Id of a request that could not be decoded, if it was recoverable.
    ///
    /// When present, the receiver answers with a correlated error
    /// response instead of dropping the line.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            DecodeError::Malformed {
                kind: MessageKind::Request,
                id: Some(id),
                ..
            } => Some(id),
            _ => None,
        }
    }
}

/// Encode a message as one line of JSON, without the trailing newline.
pub fn encode(message: &Message) -> Result<String, serde_json::Error> {
    match message {
        Message::Request(request) => serde_json::to_string(request),
        Message::Response(response) => serde_json::to_string(response),
        Message::Event(event) => serde_json::to_string(event),
    }
}

/// Decode one line of JSON into a message.
pub fn decode(line: &str) -> Result<Message, DecodeError> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| DecodeError::Syntax(e.to_string()))?;
    let Value::Object(object) = value else {
        return Err(DecodeError::NotAnObject);
    };

    if object.contains_key("method") {
        decode_request(object).map(Message::Request)
    } else if object.contains_key("success") {
        decode_response(object).map(Message::Response)
    } else if object.contains_key("event") {
        decode_event(object).map(Message::Event)
    } else {
        Err(DecodeError::UnknownShape)
    }
}

fn malformed(kind: MessageKind, id: Option<String>, reason: impl Into<String>) -> DecodeError {
    DecodeError::Malformed {
        kind,
        id,
        reason: reason.into(),
    }
}

fn decode_request(mut object: Map<String, Value>) -> Result<Request, DecodeError> {
    let id = match object.remove("id") {
        Some(Value::String(id)) => id,
        _ => return Err(malformed(MessageKind::Request, None, "missing or non-string id")),
    };

    let method = match object.remove("method") {
        Some(Value::String(method)) => method,
        _ => {
            return Err(malformed(
                MessageKind::Request,
                Some(id),
                "method must be a string",
            ))
        }
    };

    let params = match object.remove("params") {
        None | Some(Value::Null) => None,
        Some(params @ Value::Object(_)) => Some(params),
        Some(_) => {
            return Err(malformed(
                MessageKind::Request,
                Some(id),
                "params must be an object",
            ))
        }
    };

    Ok(Request { id, method, params })
}

fn decode_response(object: Map<String, Value>) -> Result<Response, DecodeError> {
    let id = object
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string);
    let wire: WireResponse = serde_json::from_value(Value::Object(object))
        .map_err(|e| malformed(MessageKind::Response, id, e.to_string()))?;

    if wire.success {
        Ok(Response::success(wire.id, wire.result))
    } else {
        match wire.error {
            Some(error) => Ok(Response::failure(wire.id, error)),
            None => Err(malformed(
                MessageKind::Response,
                Some(wire.id),
                "failed response without error",
            )),
        }
    }
}

fn decode_event(object: Map<String, Value>) -> Result<EventMessage, DecodeError> {
    serde_json::from_value(Value::Object(object))
        .map_err(|e| malformed(MessageKind::Event, None, e.to_string()))
}
