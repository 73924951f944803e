//! JSON frame encoding and decoding.
//!
//! Every frame is one JSON object. Outbound requests are the serialized
//! [`Request`] with `request_id` and `token` spliced in. Inbound frames are
//! split into a correlation id (if any) and the remaining body, which is
//! either a response payload or an unsolicited event.

use serde_json::{Value, json};
use tessera_types::{ClientToken, EventKind, Request, ServerEvent};

use crate::error::ClientError;

/// Key carrying the correlation id in both directions.
pub(crate) const REQUEST_ID: &str = "request_id";

/// An inbound frame with its correlation id pulled out.
#[derive(Debug)]
pub(crate) struct Frame {
    pub request_id: Option<u64>,
    pub body: Value,
}

/// What an uncorrelated frame turned out to be.
#[derive(Debug)]
pub(crate) enum Inbound {
    Event(ServerEvent),
    Unknown(String),
    Malformed {
        kind: String,
        error: serde_json::Error,
    },
}

/// First frame on a fresh link.
pub(crate) fn encode_handshake(token: &ClientToken) -> String {
    json!({ "token": token.as_str() }).to_string()
}

/// Whether `frame` is the server's handshake acknowledgement.
pub(crate) fn is_connect_ack(frame: &str) -> bool {
    serde_json::from_str::<Value>(frame)
        .ok()
        .as_ref()
        .and_then(|v| v.get("type"))
        .and_then(Value::as_str)
        == Some(EventKind::Connect.as_str())
}

pub(crate) fn encode_request(
    request: &Request,
    request_id: u64,
    token: &ClientToken,
) -> Result<String, ClientError> {
    let mut value = serde_json::to_value(request).map_err(ClientError::Encode)?;
    if let Value::Object(map) = &mut value {
        map.insert(REQUEST_ID.to_owned(), Value::from(request_id));
        map.insert("token".to_owned(), Value::from(token.as_str()));
    }
    serde_json::to_string(&value).map_err(ClientError::Encode)
}

pub(crate) fn decode(frame: &str) -> Result<Frame, serde_json::Error> {
    let mut body: Value = serde_json::from_str(frame)?;
    let request_id = body
        .as_object_mut()
        .and_then(|map| map.remove(REQUEST_ID))
        .and_then(|id| id.as_u64());
    Ok(Frame { request_id, body })
}

/// Interpret an uncorrelated body as an event.
pub(crate) fn into_event(body: Value) -> Inbound {
    let kind = body
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    if EventKind::from_wire(&kind).is_none() {
        return Inbound::Unknown(kind);
    }
    match serde_json::from_value(body) {
        Ok(event) => Inbound::Event(event),
        Err(error) => Inbound::Malformed { kind, error },
    }
}

/// Turn a correlated response body into the caller's result.
pub(crate) fn into_response(body: Value) -> Result<Value, ClientError> {
    if body.get("type").and_then(Value::as_str) != Some("error") {
        return Ok(body);
    }
    let reason = body
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or("unspecified")
        .to_owned();
    let details = body
        .get("details")
        .or_else(|| body.get("data"))
        .filter(|v| !v.is_null())
        .cloned();
    Err(ClientError::RemoteError { reason, details })
}
