/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! MPMC broadcast bus for [`RoomEvent`]s.
//!
//! The bus is an explicitly constructed value with a process-wide lifecycle:
//! the host application creates one at startup, hands a clone to the room
//! coordinator, and subscribes wherever it wants to render state. There is
//! no hidden global.
//!
//! # Example
//!
//! ```ignore
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//! wasm_bindgen_futures::spawn_local(async move {
//!     while let Ok(event) = rx.recv().await {
//!         match event {
//!             RoomEvent::ParticipantJoined(p) => { /* render */ }
//!             _ => {}
//!         }
//!     }
//! });
//! ```

use crate::events::RoomEvent;
use async_broadcast::{broadcast, InactiveReceiver, Receiver, Sender};

/// Capacity of the event channel; older events are dropped once a slow
/// subscriber falls this far behind.
const EVENT_BUS_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventBus {
    sender: Sender<RoomEvent>,
    // Keeps the channel open while no subscriber is active, without
    // buffering events nobody will read.
    _keepalive: InactiveReceiver<RoomEvent>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EventBus")
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (mut sender, receiver) = broadcast(EVENT_BUS_CAPACITY);
        sender.set_overflow(true);
        Self {
            sender,
            _keepalive: receiver.deactivate(),
        }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> Receiver<RoomEvent> {
        self.sender.new_receiver()
    }

    /// Publish one event. Never blocks; with overflow enabled the only
    /// failure mode is a closed channel, which is ignored.
    pub fn emit(&self, event: RoomEvent) {
        let _ = self.sender.try_broadcast(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_receives_emitted_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(RoomEvent::LocalSpeakingStateChanged { is_speaking: true });
        assert_eq!(
            rx.try_recv().unwrap(),
            RoomEvent::LocalSpeakingStateChanged { is_speaking: true }
        );
    }

    #[test]
    fn emitting_without_subscribers_is_not_an_error() {
        let bus = EventBus::new();
        bus.emit(RoomEvent::ChannelDisconnected { channel_id: 1 });
        // A later subscriber only sees later events.
        let mut rx = bus.subscribe();
        bus.emit(RoomEvent::ChannelDisconnected { channel_id: 2 });
        assert_eq!(
            rx.try_recv().unwrap(),
            RoomEvent::ChannelDisconnected { channel_id: 2 }
        );
    }

    #[test]
    fn clones_share_the_channel() {
        let bus = EventBus::new();
        let other = bus.clone();
        let mut rx = bus.subscribe();
        other.emit(RoomEvent::ChannelConnected {
            channel_id: 3,
            channel_name: "General".into(),
        });
        assert!(rx.try_recv().is_ok());
    }
}
