//! The multiplex frame carried over the single physical WebSocket between
//! a reverse proxy and a backend, fanning many logical client sessions
//! over one connection.
//!
//! Unlike [`crate::message::ClientMessage`], an unrecognised `type` here
//! is fatal to the *frame*: the caller must log and drop rather than
//! guess a shape, since a multiplex frame controls session lifecycle
//! (`Connected`/`Disconnect`), not opaque client chatter.

use crate::message::ClientMessage;
use serde::de::Error as DeError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod type_code {
    pub const PAYLOAD: i64 = 0;
    pub const CONNECTED: i64 = 1;
    pub const DISCONNECT: i64 = 2;
}

#[derive(Debug, Clone, PartialEq)]
pub enum MultiplexFrame {
    Payload { client_id: String, msg: ClientMessage },
    Connected { client_id: String },
    Disconnect { client_id: String },
}

impl MultiplexFrame {
    pub fn client_id(&self) -> &str {
        match self {
            MultiplexFrame::Payload { client_id, .. }
            | MultiplexFrame::Connected { client_id }
            | MultiplexFrame::Disconnect { client_id } => client_id,
        }
    }

    fn type_code(&self) -> i64 {
        match self {
            MultiplexFrame::Payload { .. } => type_code::PAYLOAD,
            MultiplexFrame::Connected { .. } => type_code::CONNECTED,
            MultiplexFrame::Disconnect { .. } => type_code::DISCONNECT,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    ty: i64,
    id: String,
    #[serde(default)]
    msg: serde_json::Value,
}

/// A multiplex frame whose `type` this crate doesn't recognise. The
/// caller decides the drop/log policy; this type only carries what was
/// on the wire.
#[derive(Debug, thiserror::Error)]
#[error("unknown multiplex frame type {type_code} for client {client_id}")]
pub struct UnknownFrameType {
    pub type_code: i64,
    pub client_id: String,
}

impl Serialize for MultiplexFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("MultiplexFrame", 3)?;
        s.serialize_field("type", &self.type_code())?;
        s.serialize_field("id", self.client_id())?;
        match self {
            MultiplexFrame::Payload { msg, .. } => s.serialize_field("msg", msg)?,
            MultiplexFrame::Connected { .. } | MultiplexFrame::Disconnect { .. } => {
                s.serialize_field("msg", &serde_json::Value::Null)?;
            }
        }
        s.end()
    }
}

impl<'de> Deserialize<'de> for MultiplexFrame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let env = Envelope::deserialize(deserializer)?;
        Ok(match env.ty {
            type_code::PAYLOAD => MultiplexFrame::Payload {
                client_id: env.id,
                msg: serde_json::from_value(env.msg).map_err(DeError::custom)?,
            },
            type_code::CONNECTED => MultiplexFrame::Connected { client_id: env.id },
            type_code::DISCONNECT => MultiplexFrame::Disconnect { client_id: env.id },
            other => {
                return Err(DeError::custom(UnknownFrameType {
                    type_code: other,
                    client_id: env.id,
                }));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Authority, HelloPayload};

    #[test]
    fn connected_round_trips() {
        let f = MultiplexFrame::Connected {
            client_id: "c1".into(),
        };
        let json = serde_json::to_string(&f).unwrap();
        let back: MultiplexFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }

    #[test]
    fn payload_round_trips_nested_message() {
        let f = MultiplexFrame::Payload {
            client_id: "c1".into(),
            msg: ClientMessage::Hello(HelloPayload {
                authority: Authority::Guest,
            }),
        };
        let json = serde_json::to_string(&f).unwrap();
        let back: MultiplexFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }

    #[test]
    fn unknown_type_is_an_error_not_opaque() {
        let json = r#"{"type":7,"id":"c1","msg":null}"#;
        assert!(serde_json::from_str::<MultiplexFrame>(json).is_err());
    }
}
