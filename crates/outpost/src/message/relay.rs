// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Relay messages

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use super::{MessageHandleError, SubscriptionId};
use crate::event::{Event, EventId};

/// Messages sent by relays, received by clients
///
/// <https://github.com/nostr-protocol/nips/blob/master/01.md>
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// Event requested by a subscription
    ///
    /// JSON: `["EVENT", <subscription_id>, <event JSON>]`
    Event {
        /// Subscription ID
        subscription_id: SubscriptionId,
        /// Event
        event: Box<Event>,
    },
    /// Acceptance or denial of an `EVENT` message
    ///
    /// JSON: `["OK", <event_id>, <true|false>, <message>]`
    Ok {
        /// Event ID
        event_id: EventId,
        /// Status
        status: bool,
        /// Message
        message: String,
    },
    /// End of stored events: all cached events matching the subscription
    /// have been sent
    ///
    /// JSON: `["EOSE", <subscription_id>]`
    EndOfStoredEvents(SubscriptionId),
    /// Subscription closed server-side
    ///
    /// JSON: `["CLOSED", <subscription_id>, <message>]`
    Closed {
        /// Subscription ID
        subscription_id: SubscriptionId,
        /// Message
        message: String,
    },
    /// Human-readable notice
    ///
    /// JSON: `["NOTICE", <message>]`
    Notice(String),
    /// Authentication challenge
    ///
    /// JSON: `["AUTH", <challenge>]`
    ///
    /// <https://github.com/nostr-protocol/nips/blob/master/42.md>
    Auth {
        /// Challenge
        challenge: String,
    },
}

impl RelayMessage {
    /// Convert to JSON [`Value`]
    pub fn as_value(&self) -> Value {
        match self {
            Self::Event {
                subscription_id,
                event,
            } => json!(["EVENT", subscription_id, event]),
            Self::Ok {
                event_id,
                status,
                message,
            } => json!(["OK", event_id, status, message]),
            Self::EndOfStoredEvents(subscription_id) => json!(["EOSE", subscription_id]),
            Self::Closed {
                subscription_id,
                message,
            } => json!(["CLOSED", subscription_id, message]),
            Self::Notice(message) => json!(["NOTICE", message]),
            Self::Auth { challenge } => json!(["AUTH", challenge]),
        }
    }

    /// Parse from JSON [`Value`]
    pub fn from_value(msg: Value) -> Result<Self, MessageHandleError> {
        let v = msg
            .as_array()
            .ok_or(MessageHandleError::InvalidMessageFormat)?;

        if v.is_empty() {
            return Err(MessageHandleError::InvalidMessageFormat);
        }

        match v[0].as_str() {
            Some("EVENT") => {
                if v.len() != 3 {
                    return Err(MessageHandleError::InvalidMessageFormat);
                }
                let subscription_id: SubscriptionId = serde_json::from_value(v[1].clone())?;
                let event: Event = serde_json::from_value(v[2].clone())?;
                Ok(Self::Event {
                    subscription_id,
                    event: Box::new(event),
                })
            }
            Some("OK") => {
                if v.len() != 4 {
                    return Err(MessageHandleError::InvalidMessageFormat);
                }
                let event_id: EventId = serde_json::from_value(v[1].clone())?;
                let status: bool = v[2]
                    .as_bool()
                    .ok_or(MessageHandleError::InvalidMessageFormat)?;
                let message: String = serde_json::from_value(v[3].clone())?;
                Ok(Self::Ok {
                    event_id,
                    status,
                    message,
                })
            }
            Some("EOSE") => {
                if v.len() != 2 {
                    return Err(MessageHandleError::InvalidMessageFormat);
                }
                let subscription_id: SubscriptionId = serde_json::from_value(v[1].clone())?;
                Ok(Self::EndOfStoredEvents(subscription_id))
            }
            Some("CLOSED") => {
                if v.len() != 3 {
                    return Err(MessageHandleError::InvalidMessageFormat);
                }
                let subscription_id: SubscriptionId = serde_json::from_value(v[1].clone())?;
                let message: String = serde_json::from_value(v[2].clone())?;
                Ok(Self::Closed {
                    subscription_id,
                    message,
                })
            }
            Some("NOTICE") => {
                if v.len() != 2 {
                    return Err(MessageHandleError::InvalidMessageFormat);
                }
                let message: String = serde_json::from_value(v[1].clone())?;
                Ok(Self::Notice(message))
            }
            Some("AUTH") => {
                if v.len() != 2 {
                    return Err(MessageHandleError::InvalidMessageFormat);
                }
                let challenge: String = serde_json::from_value(v[1].clone())?;
                Ok(Self::Auth { challenge })
            }
            _ => Err(MessageHandleError::InvalidMessageFormat),
        }
    }

    /// Serialize as JSON string
    #[inline]
    pub fn as_json(&self) -> String {
        self.as_value().to_string()
    }

    /// Deserialize from JSON string
    pub fn from_json<T>(json: T) -> Result<Self, MessageHandleError>
    where
        T: AsRef<[u8]>,
    {
        let value: Value = serde_json::from_slice(json.as_ref())?;
        Self::from_value(value)
    }
}

impl Serialize for RelayMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.as_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RelayMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Kind, Tags, UnsignedEvent};
    use crate::types::Timestamp;
    use crate::Keys;

    #[test]
    fn test_event_round_trip() {
        let keys = Keys::generate();
        let event = UnsignedEvent::new(
            keys.public_key(),
            Timestamp::from(1_700_000_000),
            Kind::TEXT_NOTE,
            Tags::default(),
            "test",
        )
        .sign(&keys)
        .unwrap();

        let msg = RelayMessage::Event {
            subscription_id: SubscriptionId::new("sub"),
            event: Box::new(event),
        };

        let json = msg.as_json();
        assert_eq!(RelayMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_eose() {
        let msg = RelayMessage::from_json(r#"["EOSE","sub"]"#).unwrap();
        assert_eq!(msg, RelayMessage::EndOfStoredEvents(SubscriptionId::new("sub")));
    }

    #[test]
    fn test_ok() {
        let id = "70b10f70c1318967eddf12527799411b1a9780ad9c43858f5e5fcd45486a13a5";
        let json = format!(r#"["OK","{id}",true,"pow: difficulty 25>=24"]"#);
        let msg = RelayMessage::from_json(json).unwrap();
        assert_eq!(
            msg,
            RelayMessage::Ok {
                event_id: EventId::from_hex(id).unwrap(),
                status: true,
                message: String::from("pow: difficulty 25>=24"),
            }
        );
    }

    #[test]
    fn test_invalid_format() {
        assert!(RelayMessage::from_json(r#"["EVENT","sub"]"#).is_err());
        assert!(RelayMessage::from_json(r#"{"not":"an array"}"#).is_err());
    }
}
