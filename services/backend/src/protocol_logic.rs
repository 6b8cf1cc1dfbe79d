//! The controller decision table shared by direct clients ([`crate::client_session`])
//! and multiplexed clients ([`crate::multiplex`]): given a decoded
//! message and the sender's role, decide what happens next. Kept
//! transport-agnostic so both call sites share one place that knows
//! the protocol's rules.

use rb_protocol::message::{ClientMessage, PingPayload, PongPayload, StateUpdatePayload};
use rb_protocol::Received;

use crate::room::ClientRole;

pub enum Outcome {
    /// Reply directly to the sender.
    Reply(Received<ClientMessage>),
    /// Forward to the room's recv queue; sender was a master.
    Forward(Received<StateUpdatePayload>),
    /// Nothing to do.
    Ignore,
}

pub fn handle_client_message(
    client_id: &str,
    role: ClientRole,
    received: Received<ClientMessage>,
) -> Outcome {
    match received.message {
        ClientMessage::Ping(PingPayload { send_time }) => Outcome::Reply(Received {
            sender: client_id.to_string(),
            // carries the ping's receipt time so the writer can compute
            // service time at send, not receive, time
            received_at: received.received_at,
            message: ClientMessage::Pong(PongPayload {
                send_time,
                service_time: 0.0,
            }),
        }),
        ClientMessage::StateUpdate(update) if role == ClientRole::Master => Outcome::Forward(Received {
            sender: client_id.to_string(),
            received_at: received.received_at,
            message: update,
        }),
        // Non-masters attempting a state update, and Hello/StateBroadcast/
        // Reserved arriving from a client, are all no-ops.
        _ => Outcome::Ignore,
    }
}

/// Stamps a reply's `service_time` at the moment it is actually about
/// to be written to the transport, per the controller/writer split.
pub fn finalise_pong(mut received: Received<ClientMessage>) -> Received<ClientMessage> {
    if let ClientMessage::Pong(ref mut p) = received.message {
        p.service_time = received.received_at.elapsed().as_secs_f64();
    }
    received
}
