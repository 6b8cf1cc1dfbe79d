// rb-protocol: wire types and two-phase tagged-union codecs for the
// client<->backend and proxy<->backend channels.

pub mod message;
pub mod multiplex;
pub mod rest;

pub use message::ClientMessage;
pub use multiplex::MultiplexFrame;

/// A decoded message paired with who sent it and when it was decoded.
///
/// `sender` and `received_at` are never part of the wire format — they
/// are stamped by the decoder at ingress, mirroring the original
/// system's `Sender`/`ReceivedAt` fields (both tagged `json:"-"`).
#[derive(Debug, Clone)]
pub struct Received<T> {
    pub sender: String,
    pub received_at: std::time::Instant,
    pub message: T,
}

impl<T> Received<T> {
    pub fn new(sender: impl Into<String>, message: T) -> Self {
        Self {
            sender: sender.into(),
            received_at: std::time::Instant::now(),
            message,
        }
    }
}
