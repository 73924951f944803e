//! Error types for the Tessera client.
//!
//! Request failures resolve only the caller that issued the request; they
//! never tear down the connection or touch other pending requests. Store
//! failures are contract violations by the server and are logged and
//! dropped by the dispatcher rather than propagated.

use std::time::Duration;

use serde_json::Value;
use tessera_types::EntityId;

/// Failures of the underlying connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No connection is currently established.
    #[error("not connected")]
    NotConnected,

    /// The link was closed while a frame was being written.
    #[error("connection closed")]
    Closed,

    /// The application-level handshake did not complete.
    #[error("handshake failed: {0}")]
    Handshake(String),
}

/// Errors returned from request/response calls and client setup.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No matching response arrived before the deadline.
    #[error("request {request_id} timed out after {timeout:?}")]
    RequestTimeout {
        /// Correlation id of the abandoned request.
        request_id: u64,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The server explicitly rejected the request.
    #[error("server rejected request: {reason}")]
    RemoteError {
        /// Short rejection reason.
        reason: String,
        /// Optional structured details.
        details: Option<Value>,
    },

    /// Writing the request failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The transport was shut down while the request was outstanding.
    #[error("transport shut down")]
    Shutdown,

    /// The request could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(serde_json::Error),

    /// The response payload did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(serde_json::Error),
}

/// Entity store contract violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// An add named an id that is already live.
    #[error("duplicate entity: {0}")]
    DuplicateEntity(EntityId),

    /// An update named an id that is not live.
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),
}

/// What an event handler may fail with. The dispatcher logs it and moves on
/// to the next handler.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The store rejected the operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Any other handler-specific failure.
    #[error("{0}")]
    Other(String),
}
