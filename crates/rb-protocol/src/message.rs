//! The client-protocol message: the tagged union carried inside every
//! direct client WebSocket frame and inside `Payload` multiplex frames.
//!
//! The wire tag is an integer `type` field, not a string, so serde's
//! built-in internally-tagged enum support (which expects the payload
//! itself to carry the tag as a map key) doesn't apply here. Decoding is
//! a manual two-phase parse: first the envelope (`type` + opaque
//! `payload`), then a second pass dispatching on `type` into the
//! concrete payload shape.

use serde::de::Error as DeError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wire-level type codes for [`ClientMessage`].
pub mod type_code {
    pub const HELLO: i64 = 0;
    pub const PING: i64 = 1;
    pub const PONG: i64 = 2;
    pub const STATE_BROADCAST: i64 = 3;
    pub const STATE_UPDATE: i64 = 4;
    pub const RESERVED: i64 = 99;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i64)]
pub enum PlaybackStatus {
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

/// The `StateBroadcast`/`StateUpdate.state` payload shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStateWire {
    #[serde(rename = "src")]
    pub source: String,
    pub status: PlaybackStatus,
    pub position: f64,
    pub speed: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloPayload {
    pub authority: Authority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authority {
    Master,
    Guest,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingPayload {
    #[serde(rename = "sendtime")]
    pub send_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PongPayload {
    #[serde(rename = "sendtime")]
    pub send_time: f64,
    #[serde(rename = "servicetime")]
    pub service_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdatePayload {
    pub state: PlaybackStateWire,
    pub rtt: f64,
}

/// The client-protocol message. `Reserved` carries an opaque JSON value
/// and round-trips unmodified — it is a forward-compatibility hook, not
/// an error case, and must never fail to decode.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Hello(HelloPayload),
    Ping(PingPayload),
    Pong(PongPayload),
    StateBroadcast(PlaybackStateWire),
    StateUpdate(StateUpdatePayload),
    Reserved(serde_json::Value),
}

impl ClientMessage {
    pub fn type_code(&self) -> i64 {
        match self {
            ClientMessage::Hello(_) => type_code::HELLO,
            ClientMessage::Ping(_) => type_code::PING,
            ClientMessage::Pong(_) => type_code::PONG,
            ClientMessage::StateBroadcast(_) => type_code::STATE_BROADCAST,
            ClientMessage::StateUpdate(_) => type_code::STATE_UPDATE,
            ClientMessage::Reserved(_) => type_code::RESERVED,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    ty: i64,
    #[serde(default)]
    payload: serde_json::Value,
}

impl Serialize for ClientMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ClientMessage", 2)?;
        s.serialize_field("type", &self.type_code())?;
        match self {
            ClientMessage::Hello(p) => s.serialize_field("payload", p)?,
            ClientMessage::Ping(p) => s.serialize_field("payload", p)?,
            ClientMessage::Pong(p) => s.serialize_field("payload", p)?,
            ClientMessage::StateBroadcast(p) => s.serialize_field("payload", p)?,
            ClientMessage::StateUpdate(p) => s.serialize_field("payload", p)?,
            ClientMessage::Reserved(v) => s.serialize_field("payload", v)?,
        }
        s.end()
    }
}

impl<'de> Deserialize<'de> for ClientMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let env = Envelope::deserialize(deserializer)?;
        Ok(match env.ty {
            type_code::HELLO => ClientMessage::Hello(
                serde_json::from_value(env.payload).map_err(DeError::custom)?,
            ),
            type_code::PING => {
                ClientMessage::Ping(serde_json::from_value(env.payload).map_err(DeError::custom)?)
            }
            type_code::PONG => {
                ClientMessage::Pong(serde_json::from_value(env.payload).map_err(DeError::custom)?)
            }
            type_code::STATE_BROADCAST => ClientMessage::StateBroadcast(
                serde_json::from_value(env.payload).map_err(DeError::custom)?,
            ),
            type_code::STATE_UPDATE => ClientMessage::StateUpdate(
                serde_json::from_value(env.payload).map_err(DeError::custom)?,
            ),
            // Unknown types fold into Reserved alongside the literal 99 code:
            // an unrecognised type must never terminate the connection.
            _ => ClientMessage::Reserved(env.payload),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_round_trips() {
        let m = ClientMessage::Hello(HelloPayload {
            authority: Authority::Master,
        });
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"type":0,"payload":{"authority":"master"}}"#);
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn state_update_round_trips() {
        let m = ClientMessage::StateUpdate(StateUpdatePayload {
            state: PlaybackStateWire {
                source: "u".into(),
                status: PlaybackStatus::Playing,
                position: 10.0,
                speed: 1.0,
                duration: 60.0,
            },
            rtt: 0.2,
        });
        let json = serde_json::to_string(&m).unwrap();
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn unknown_type_becomes_reserved_opaque() {
        let json = r#"{"type":99,"payload":{"anything":"goes"}}"#;
        let m: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(m.type_code(), type_code::RESERVED);
        assert!(matches!(m, ClientMessage::Reserved(_)));

        // a truly unrecognised code must decode too, not error
        let json2 = r#"{"type":123,"payload":null}"#;
        let m2: ClientMessage = serde_json::from_str(json2).unwrap();
        assert!(matches!(m2, ClientMessage::Reserved(_)));
    }

    #[test]
    fn malformed_known_type_payload_errors() {
        let json = r#"{"type":1,"payload":{"sendtime":"not-a-number"}}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }
}
