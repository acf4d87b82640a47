use thiserror::Error;

use crate::MessageType;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown message type {0:?}")]
    UnknownType(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid {kind} payload: {reason}")]
    Payload { kind: MessageType, reason: String },
}
