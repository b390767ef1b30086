//! Signaling boundary.
//!
//! The voice core exchanges validated [`ClientSignal`]/`ServerSignal`
//! values with a signaling server through a transport it does not own.
//! [`SignalingChannel`] is the narrow outbound interface the room
//! coordinator holds; inbound events reach the coordinator as already
//! parsed values, so malformed frames die at the transport.

#[cfg(target_arch = "wasm32")]
pub mod websocket;

use voicemesh_types::ClientSignal;

#[cfg(target_arch = "wasm32")]
pub use websocket::WebSocketSignaling;

/// Outbound half of the signaling connection. Fire-and-forget: delivery
/// failures are the transport's to log, the core has no retry story for
/// individual frames.
pub trait SignalingChannel {
    fn send(&self, signal: ClientSignal);
}

/// Connection-level status of the signaling transport.
#[derive(Clone, Debug, PartialEq)]
pub enum SignalingStatus {
    Opened,
    Closed,
    Error(String),
}
