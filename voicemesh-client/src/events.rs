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

//! Framework-agnostic domain events published by the voice core.
//!
//! These events are emitted via the event bus and can be subscribed to by
//! any frontend framework. They are the only way state changes inside the
//! core become visible to the rest of the application.

use voicemesh_types::Participant;

/// Events emitted by the room coordinator that UI frameworks can subscribe
/// to.
#[derive(Clone, Debug, PartialEq)]
pub enum RoomEvent {
    // === Channel events ===
    /// The local user joined a voice channel.
    ChannelConnected { channel_id: u32, channel_name: String },

    /// The local user left a voice channel; carries the id of the channel
    /// that was just left.
    ChannelDisconnected { channel_id: u32 },

    // === Participant events ===
    /// A new remote member joined the current channel.
    ParticipantJoined(Participant),

    /// A remote member left the current channel.
    ParticipantLeft { socket_id: String },

    /// The roster changed in place (speaking flags, roster replacement).
    ParticipantsUpdated(Vec<Participant>),

    // === Local state events ===
    /// The local user's voice-activity state flipped. The local user is not
    /// part of the roster, so this is a standalone event.
    LocalSpeakingStateChanged { is_speaking: bool },
}

/// Severity of a user-visible notice. `Error` notices are still
/// informational text, never raw technical error output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeSeverity {
    Info,
    Error,
}

/// A short human-readable notice for the host application to display
/// (toast, status bar, whatever it prefers).
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub severity: NoticeSeverity,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: NoticeSeverity::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: NoticeSeverity::Error,
            message: message.into(),
        }
    }
}
