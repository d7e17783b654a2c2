//! Wire message definitions for the subscriber transport
//!
//! Client requests and server messages are tagged JSON objects. Field
//! names are camelCase; enumerations serialize as their string tags;
//! dates and timestamps are epoch-millisecond integers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use types::ids::{InstrumentId, SubscriptionId};

use crate::delta::InstrumentDelta;

/// Inbound request from a subscriber session.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientRequest {
    /// Open a subscription over a set of instruments.
    #[serde(rename = "subscribe", rename_all = "camelCase")]
    Subscribe {
        instrument_ids: Vec<InstrumentId>,
        /// Raw predicate tree; parsed and validated at the boundary
        #[serde(default)]
        filter: Option<Value>,
        /// Desired updates per second; server default if omitted
        #[serde(default)]
        update_frequency: Option<f64>,
    },

    /// Tear down one subscription.
    #[serde(rename = "unsubscribe", rename_all = "camelCase")]
    Unsubscribe { subscription_id: SubscriptionId },
}

/// Outbound message to a subscriber session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Acknowledgement of a subscribe request.
    #[serde(rename = "subscribe-ack", rename_all = "camelCase")]
    SubscribeAck {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        subscription_id: Option<SubscriptionId>,
        message: String,
    },

    /// Acknowledgement of an unsubscribe request.
    #[serde(rename = "unsubscribe-ack", rename_all = "camelCase")]
    UnsubscribeAck { success: bool, message: String },

    /// Current snapshots of the subscribed instruments, sent once
    /// after a successful subscribe, before any updates.
    #[serde(rename = "initial-data", rename_all = "camelCase")]
    InitialData { instruments: Vec<Value> },

    /// A field-level delta for one instrument.
    #[serde(rename = "instrument-update")]
    Update(InstrumentDelta),
}

impl ServerMessage {
    /// Label for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::SubscribeAck { .. } => "subscribe-ack",
            ServerMessage::UnsubscribeAck { .. } => "unsubscribe-ack",
            ServerMessage::InitialData { .. } => "initial-data",
            ServerMessage::Update(_) => "instrument-update",
        }
    }

    /// The instrument this message concerns, for update messages.
    pub fn instrument_id(&self) -> Option<&InstrumentId> {
        match self {
            ServerMessage::Update(delta) => Some(&delta.instrument_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::field::FieldValue;

    #[test]
    fn test_parse_subscribe_request() {
        let json = r#"{
            "type": "subscribe",
            "instrumentIds": ["US10Y", "ZN-U25"],
            "filter": {"==": [{"var": "securityType"}, "Bond"]},
            "updateFrequency": 5
        }"#;
        let request: ClientRequest = serde_json::from_str(json).unwrap();
        match request {
            ClientRequest::Subscribe {
                instrument_ids,
                filter,
                update_frequency,
            } => {
                assert_eq!(instrument_ids.len(), 2);
                assert!(filter.is_some());
                assert_eq!(update_frequency, Some(5.0));
            }
            other => panic!("expected subscribe, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_subscribe_defaults() {
        let json = r#"{"type": "subscribe", "instrumentIds": ["US10Y"]}"#;
        let request: ClientRequest = serde_json::from_str(json).unwrap();
        match request {
            ClientRequest::Subscribe {
                filter,
                update_frequency,
                ..
            } => {
                assert!(filter.is_none());
                assert!(update_frequency.is_none());
            }
            other => panic!("expected subscribe, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_unsubscribe() {
        let id = SubscriptionId::new();
        let json = format!(r#"{{"type": "unsubscribe", "subscriptionId": "{id}"}}"#);
        let request: ClientRequest = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            request,
            ClientRequest::Unsubscribe { subscription_id } if subscription_id == id
        ));
    }

    #[test]
    fn test_update_wire_shape() {
        let delta = InstrumentDelta {
            instrument_id: InstrumentId::new("US10Y"),
            timestamp: 1_708_123_456_789,
            fields: [("bidPrice".to_string(), FieldValue::Number(98.25))]
                .into_iter()
                .collect(),
        };
        let json = serde_json::to_value(ServerMessage::Update(delta)).unwrap();
        assert_eq!(json["type"], "instrument-update");
        assert_eq!(json["instrumentId"], "US10Y");
        assert_eq!(json["fields"]["bidPrice"], 98.25);
    }

    #[test]
    fn test_ack_omits_absent_subscription_id() {
        let ack = ServerMessage::SubscribeAck {
            success: false,
            subscription_id: None,
            message: "unknown instrument".to_string(),
        };
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["type"], "subscribe-ack");
        assert!(json.get("subscriptionId").is_none());
    }

    #[test]
    fn test_message_kind_labels() {
        let ack = ServerMessage::UnsubscribeAck {
            success: true,
            message: "ok".to_string(),
        };
        assert_eq!(ack.kind(), "unsubscribe-ack");
        assert!(ack.instrument_id().is_none());
    }
}
