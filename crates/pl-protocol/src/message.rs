use std::fmt;

use pl_blockchain::Block;
use pl_transaction::Transaction;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::ProtocolError;

/// The four message kinds understood by nodes and the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    GetLongestChainRequest,
    GetLongestChainResponse,
    NewBlockRequest,
    NewBlockAnnouncement,
}

impl MessageType {
    /// Wire name carried in the `type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::GetLongestChainRequest => "GetLongestChainRequest",
            MessageType::GetLongestChainResponse => "GetLongestChainResponse",
            MessageType::NewBlockRequest => "NewBlockRequest",
            MessageType::NewBlockAnnouncement => "NewBlockAnnouncement",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "GetLongestChainRequest" => Some(MessageType::GetLongestChainRequest),
            "GetLongestChainResponse" => Some(MessageType::GetLongestChainResponse),
            "NewBlockRequest" => Some(MessageType::NewBlockRequest),
            "NewBlockAnnouncement" => Some(MessageType::NewBlockAnnouncement),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed message body.  The variant decides the wire `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Ask the relay for the longest chain any peer holds.
    GetLongestChainRequest,

    /// A chain, sent by a peer answering a request or by the relay delivering
    /// the winner.  Empty means "nobody else is connected".
    GetLongestChainResponse(Vec<Block>),

    /// Ask every other node to mine these transactions.
    NewBlockRequest(Vec<Transaction>),

    /// A freshly mined block.
    NewBlockAnnouncement(Block),
}

impl Payload {
    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::GetLongestChainRequest => MessageType::GetLongestChainRequest,
            Payload::GetLongestChainResponse(_) => MessageType::GetLongestChainResponse,
            Payload::NewBlockRequest(_) => MessageType::NewBlockRequest,
            Payload::NewBlockAnnouncement(_) => MessageType::NewBlockAnnouncement,
        }
    }
}

/// A message envelope.
///
/// `correlation_id` is chosen by whoever starts an exchange and echoed by
/// every response belonging to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub correlation_id: Uuid,
    pub payload: Payload,
}

impl Message {
    /// Start a new exchange with a fresh correlation id.
    pub fn new(payload: Payload) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            payload,
        }
    }

    /// Answer within an existing exchange.
    pub fn reply(correlation_id: Uuid, payload: Payload) -> Self {
        Self {
            correlation_id,
            payload,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }
}

/// On-the-wire shape: `{"type": ..., "correlationId": ..., "payload": ...}`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    correlation_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

/// Encode a [`Message`] as a single JSON line (without the trailing newline).
pub fn encode_message(msg: &Message) -> Result<String, ProtocolError> {
    let payload = match &msg.payload {
        Payload::GetLongestChainRequest => None,
        Payload::GetLongestChainResponse(chain) => Some(serde_json::to_value(chain)?),
        Payload::NewBlockRequest(txs) => Some(serde_json::to_value(txs)?),
        Payload::NewBlockAnnouncement(block) => Some(serde_json::to_value(block)?),
    };

    let envelope = Envelope {
        kind: msg.message_type().as_str().to_string(),
        correlation_id: msg.correlation_id,
        payload,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Decode one JSON line into a [`Message`].
///
/// An unrecognised `type` yields [`ProtocolError::UnknownType`] so callers
/// can log it and move on without treating it as a broken peer.
pub fn decode_message(line: &str) -> Result<Message, ProtocolError> {
    let envelope: Envelope = serde_json::from_str(line)?;
    let kind = MessageType::from_wire(&envelope.kind)
        .ok_or_else(|| ProtocolError::UnknownType(envelope.kind.clone()))?;

    let payload = match kind {
        MessageType::GetLongestChainRequest => Payload::GetLongestChainRequest,
        MessageType::GetLongestChainResponse => {
            Payload::GetLongestChainResponse(payload_as(kind, envelope.payload)?)
        }
        MessageType::NewBlockRequest => Payload::NewBlockRequest(payload_as(kind, envelope.payload)?),
        MessageType::NewBlockAnnouncement => {
            Payload::NewBlockAnnouncement(payload_as(kind, envelope.payload)?)
        }
    };

    Ok(Message {
        correlation_id: envelope.correlation_id,
        payload,
    })
}

fn payload_as<T: serde::de::DeserializeOwned>(
    kind: MessageType,
    value: Option<Value>,
) -> Result<T, ProtocolError> {
    let value = value.ok_or_else(|| ProtocolError::Payload {
        kind,
        reason: "missing payload".to_string(),
    })?;
    serde_json::from_value(value).map_err(|e| ProtocolError::Payload {
        kind,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_has_no_payload_on_the_wire() {
        let msg = Message::new(Payload::GetLongestChainRequest);
        let line = encode_message(&msg).unwrap();
        let json: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["type"], "GetLongestChainRequest");
        assert_eq!(json["correlationId"], msg.correlation_id.to_string());
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn announcement_survives_encoding() {
        let msg = Message::new(Payload::NewBlockAnnouncement(Block::genesis()));
        let decoded = decode_message(&encode_message(&msg).unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn reply_keeps_correlation_id() {
        let request = Message::new(Payload::GetLongestChainRequest);
        let reply = Message::reply(
            request.correlation_id,
            Payload::GetLongestChainResponse(vec![Block::genesis()]),
        );
        assert_eq!(reply.correlation_id, request.correlation_id);
        assert_eq!(reply.message_type(), MessageType::GetLongestChainResponse);
    }

    #[test]
    fn fresh_messages_get_distinct_correlation_ids() {
        let a = Message::new(Payload::GetLongestChainRequest);
        let b = Message::new(Payload::GetLongestChainRequest);
        assert_ne!(a.correlation_id, b.correlation_id);
    }

    #[test]
    fn unknown_type_is_reported() {
        let line = format!(
            r#"{{"type":"PING","correlationId":"{}"}}"#,
            Uuid::new_v4()
        );
        match decode_message(&line) {
            Err(ProtocolError::UnknownType(kind)) => assert_eq!(kind, "PING"),
            other => panic!("expected UnknownType, got {other:?}"),
        }
    }

    #[test]
    fn malformed_chain_payload_is_rejected() {
        let line = format!(
            r#"{{"type":"GetLongestChainResponse","correlationId":"{}","payload":"nope"}}"#,
            Uuid::new_v4()
        );
        assert!(matches!(
            decode_message(&line),
            Err(ProtocolError::Payload {
                kind: MessageType::GetLongestChainResponse,
                ..
            })
        ));
    }

    #[test]
    fn missing_payload_is_rejected() {
        let line = format!(
            r#"{{"type":"NewBlockRequest","correlationId":"{}"}}"#,
            Uuid::new_v4()
        );
        assert!(matches!(decode_message(&line), Err(ProtocolError::Payload { .. })));
    }

    #[test]
    fn garbage_is_a_json_error() {
        assert!(matches!(decode_message("{not json"), Err(ProtocolError::Json(_))));
    }

    #[test]
    fn transactions_decode_from_plain_objects() {
        let line = format!(
            r#"{{"type":"NewBlockRequest","correlationId":"{}","payload":[{{"sender":"a","recipient":"b","amount":3}}]}}"#,
            Uuid::new_v4()
        );
        match decode_message(&line).unwrap().payload {
            Payload::NewBlockRequest(txs) => {
                assert_eq!(txs, vec![Transaction::new("a", "b", 3).unwrap()]);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
