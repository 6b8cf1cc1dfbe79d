//! REST DTOs shared between the backend, the scheduler, and the reverse
//! proxy. Field names match the wire contract exactly (camelCase where
//! the original used it) since both Rust and non-Rust clients speak it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfoMsg {
    pub ok: bool,
    pub nroom: usize,
    pub rooms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomCreatedMsg {
    pub ok: bool,
    #[serde(rename = "roomID")]
    pub room_id: String,
    #[serde(rename = "masterToken")]
    pub master_token: String,
    #[serde(rename = "guestToken")]
    pub guest_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllRoomEntry {
    #[serde(rename = "roomID")]
    pub room_id: String,
    #[serde(rename = "masterToken")]
    pub master_token: String,
    #[serde(rename = "guestToken")]
    pub guest_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub cid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub reason: String,
}

impl ErrorEnvelope {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: reason.into(),
        }
    }
}

/// `schedule` pub/sub channel payload: the live backend set and the
/// strategy the scheduler should rebuild its host pool with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleInfo {
    /// host:port -> advisory load (always 1.0 today; see `SchedulingStrategy`).
    pub backends: HashMap<String, f64>,
    pub strategy: SchedulingStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i64)]
pub enum SchedulingStrategy {
    Balance = 0,
    /// Reserved: serialised and round-trippable, not wired to any
    /// scheduling logic.
    Compact = 1,
}
