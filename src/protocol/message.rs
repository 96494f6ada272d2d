//! Wire frames exchanged with clients

use crate::advisory::Advice;
use crate::error::{HubError, Result};
use crate::types::{ChatMessage, MessageKind, SenderRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound frame as it appears on the wire
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<Value>,
}

/// Decoded client request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientMessage {
    /// Declare which side of the negotiation this connection plays
    Role { role: String },
    /// Free-text chat, may carry an implicit price
    Chat { content: String },
    /// Explicit price bid
    PriceUpdate { content: String },
    /// Purchase confirmation
    Purchase { content: String },
    /// Any `type` the hub does not understand
    Unknown(String),
}

impl ClientMessage {
    /// Decode one frame payload
    pub fn decode(data: &[u8]) -> Result<Self> {
        let raw: RawFrame =
            serde_json::from_slice(data).map_err(|e| HubError::MalformedFrame(e.to_string()))?;

        let message = match raw.kind.as_str() {
            "role" => ClientMessage::Role {
                role: raw.role.unwrap_or_default(),
            },
            "message" => ClientMessage::Chat {
                content: content_text(raw.content)?,
            },
            "price_update" => ClientMessage::PriceUpdate {
                content: content_text(raw.content)?,
            },
            "purchase" => ClientMessage::Purchase {
                content: content_text(raw.content)?,
            },
            _ => ClientMessage::Unknown(raw.kind),
        };

        Ok(message)
    }

    /// Wire name of this message's type
    pub fn kind(&self) -> &str {
        match self {
            ClientMessage::Role { .. } => "role",
            ClientMessage::Chat { .. } => "message",
            ClientMessage::PriceUpdate { .. } => "price_update",
            ClientMessage::Purchase { .. } => "purchase",
            ClientMessage::Unknown(kind) => kind,
        }
    }
}

/// Content is normally a string; a bare JSON number is taken as its literal text
fn content_text(content: Option<Value>) -> Result<String> {
    match content {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(HubError::MalformedFrame(format!(
            "content must be a string, got {}",
            other
        ))),
    }
}

/// Outcome carried by a role acknowledgement
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ok,
    Error,
}

/// Echo of a participant's chat, price or purchase message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EchoFrame {
    #[serde(rename = "senderRole")]
    pub sender_role: SenderRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Fair-price suggestion fanned out when a round completes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryFrame {
    #[serde(rename = "senderRole")]
    pub sender_role: SenderRole,
    pub fair_price: f64,
    pub suggestion: String,
    pub seller_price: f64,
    pub buyer_price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Frame sent from the hub to a client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Chat(EchoFrame),
    PriceSell(EchoFrame),
    Purchase(EchoFrame),
    AiResponse(AdvisoryFrame),
    Status { status: AckStatus, message: String },
    Error { error: String },
}

impl ServerFrame {
    /// Echo frame for a participant message.
    ///
    /// Advisory messages need the suggestion text, which only
    /// [`ServerFrame::advisory`] has, so they are rejected here.
    pub fn echo(message: &ChatMessage) -> Option<Self> {
        let echo = EchoFrame {
            sender_role: message.sender_role,
            content: message.content.clone(),
            timestamp: message.timestamp,
        };

        match message.kind {
            MessageKind::Chat => Some(ServerFrame::Chat(echo)),
            MessageKind::PriceSell => Some(ServerFrame::PriceSell(echo)),
            MessageKind::Purchase => Some(ServerFrame::Purchase(echo)),
            MessageKind::AiResponse => None,
        }
    }

    pub fn advisory(advice: &Advice, timestamp: DateTime<Utc>) -> Self {
        ServerFrame::AiResponse(AdvisoryFrame {
            sender_role: SenderRole::Ai,
            fair_price: advice.fair_price,
            suggestion: advice.suggestion.clone(),
            seller_price: advice.seller_price,
            buyer_price: advice.buyer_price,
            timestamp,
        })
    }

    pub fn ack(message: impl Into<String>) -> Self {
        ServerFrame::Status {
            status: AckStatus::Ok,
            message: message.into(),
        }
    }

    pub fn nack(err: &HubError) -> Self {
        ServerFrame::Status {
            status: AckStatus::Error,
            message: err.client_text(),
        }
    }

    pub fn error(err: &HubError) -> Self {
        ServerFrame::Error {
            error: err.client_text(),
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_decode_known_kinds() {
        let role = ClientMessage::decode(br#"{"type":"role","role":"buyer"}"#).unwrap();
        assert_eq!(
            role,
            ClientMessage::Role {
                role: "buyer".to_string()
            }
        );

        let chat = ClientMessage::decode(br#"{"type":"message","role":"buyer","content":"hi"}"#)
            .unwrap();
        assert_eq!(
            chat,
            ClientMessage::Chat {
                content: "hi".to_string()
            }
        );

        let price = ClientMessage::decode(br#"{"type":"price_update","content":120}"#).unwrap();
        assert_eq!(
            price,
            ClientMessage::PriceUpdate {
                content: "120".to_string()
            }
        );

        let purchase = ClientMessage::decode(br#"{"type":"purchase"}"#).unwrap();
        assert_eq!(
            purchase,
            ClientMessage::Purchase {
                content: String::new()
            }
        );
    }

    #[test]
    fn test_decode_unknown_kind() {
        let msg = ClientMessage::decode(br#"{"type":"counter_offer","content":"5"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unknown("counter_offer".to_string()));
        assert_eq!(msg.kind(), "counter_offer");
    }

    #[test]
    fn test_decode_malformed() {
        let cases: [&[u8]; 3] = [
            b"not json",
            br#"{"role":"buyer"}"#,
            br#"{"type":"message","content":[1]}"#,
        ];
        for bad in cases {
            let err = ClientMessage::decode(bad).unwrap_err();
            assert!(matches!(err, HubError::MalformedFrame(_)));
        }
    }

    #[test]
    fn test_echo_frame_layout() {
        let msg = ChatMessage::from_participant(MessageKind::Chat, Role::Buyer, "hello");
        let frame = ServerFrame::echo(&msg).unwrap();
        let value: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();

        assert_eq!(value["type"], "chat");
        assert_eq!(value["senderRole"], "buyer");
        assert_eq!(value["content"], "hello");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_advisory_has_no_echo() {
        let msg = ChatMessage::advisory(110.0, "meet in the middle");
        assert!(ServerFrame::echo(&msg).is_none());
    }

    #[test]
    fn test_advisory_frame_layout() {
        let advice = Advice {
            seller_price: 120.0,
            buyer_price: 100.0,
            fair_price: 110.0,
            suggestion: "meet in the middle".to_string(),
        };
        let frame = ServerFrame::advisory(&advice, Utc::now());
        let value: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();

        assert_eq!(value["type"], "ai_response");
        assert_eq!(value["senderRole"], "ai");
        assert_eq!(value["fair_price"], 110.0);
        assert_eq!(value["suggestion"], "meet in the middle");
    }

    #[test]
    fn test_status_and_error_layout() {
        let ack: Value = serde_json::from_str(&ServerFrame::ack("role set").encode().unwrap()).unwrap();
        assert_eq!(ack, serde_json::json!({"type": "status", "status": "ok", "message": "role set"}));

        let err = ServerFrame::error(&HubError::RoleRequired);
        let value: Value = serde_json::from_str(&err.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["error"], "Role has not been set for this connection");
    }
}
