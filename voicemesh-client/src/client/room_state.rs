//! Pure roster and channel state.
//!
//! The coordinator's reaction to a signaling event is computed here as a
//! list of explicit [`RoomAction`]s, then interpreted against the live
//! transport. Splitting decision from effect keeps every roster rule
//! testable without a browser.

use crate::events::{Notice, RoomEvent};
use voicemesh_types::{Participant, ServerSignal, SignalPayload};

/// The voice channel currently joined.
#[derive(Clone, Debug, PartialEq)]
pub struct RoomChannel {
    pub id: u32,
    pub name: String,
}

/// What a join request means given the current channel.
#[derive(Clone, Debug, PartialEq)]
pub enum JoinOutcome {
    /// Already in the requested room; join is an informational no-op.
    AlreadyJoined,
    /// In a different room; a full disconnect must run first.
    SwitchingRooms(RoomChannel),
    Idle,
}

/// Effects the coordinator must carry out after applying a signaling event.
#[derive(Clone, Debug, PartialEq)]
pub enum RoomAction {
    CreateOffer { socket_id: String },
    DisconnectPeer { socket_id: String },
    HandleSignal { from: String, payload: SignalPayload },
    Emit(RoomEvent),
    Notify(Notice),
}

/// Roster and channel identity. Owned exclusively by the coordinator; all
/// external reads go through accessors so nobody holds a stale snapshot
/// across signaling events.
#[derive(Clone, Debug, Default)]
pub struct RoomState {
    channel: Option<RoomChannel>,
    participants: Vec<Participant>,
    local_socket_id: Option<String>,
}

impl RoomState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(&self) -> Option<&RoomChannel> {
        self.channel.as_ref()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, socket_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.socket_id == socket_id)
    }

    pub fn begin_join(&self, room_id: u32) -> JoinOutcome {
        match &self.channel {
            Some(current) if current.id == room_id => JoinOutcome::AlreadyJoined,
            Some(current) => JoinOutcome::SwitchingRooms(current.clone()),
            None => JoinOutcome::Idle,
        }
    }

    pub fn set_channel(&mut self, channel: RoomChannel) {
        self.channel = Some(channel);
    }

    /// Leave the room: channel cleared, every speaking flag reset. Returns
    /// the channel that was just left.
    pub fn reset_on_disconnect(&mut self) -> Option<RoomChannel> {
        for participant in &mut self.participants {
            participant.is_speaking = false;
        }
        self.channel.take()
    }

    /// Update a participant's derived speaking flag. Returns whether the
    /// roster actually changed.
    pub fn set_speaking(&mut self, socket_id: &str, is_speaking: bool) -> bool {
        match self
            .participants
            .iter_mut()
            .find(|p| p.socket_id == socket_id)
        {
            Some(p) if p.is_speaking != is_speaking => {
                p.is_speaking = is_speaking;
                true
            }
            _ => false,
        }
    }

    /// Apply one validated signaling event and return the effects to run.
    pub fn apply(&mut self, signal: ServerSignal) -> Vec<RoomAction> {
        match signal {
            ServerSignal::Created {
                participants,
                self_id,
            } => {
                if self_id.is_some() {
                    self.local_socket_id = self_id;
                }
                let local = self.local_socket_id.clone();
                self.participants = participants
                    .into_iter()
                    .filter(|p| local.as_deref() != Some(p.socket_id.as_str()))
                    .map(|mut p| {
                        p.is_speaking = false;
                        p
                    })
                    .collect();
                vec![RoomAction::Emit(RoomEvent::ParticipantsUpdated(
                    self.participants.clone(),
                ))]
            }
            ServerSignal::UserConnected {
                socket_id,
                user_data,
            } => {
                if self.local_socket_id.as_deref() == Some(socket_id.as_str()) {
                    return Vec::new();
                }
                if self.participant(&socket_id).is_some() {
                    // Duplicate announcement; the existing entry stands.
                    return Vec::new();
                }
                let participant = Participant::new(socket_id.clone(), user_data);
                let username = participant.user_data.username.clone();
                self.participants.push(participant.clone());
                vec![
                    RoomAction::Emit(RoomEvent::ParticipantJoined(participant)),
                    // Peers that join after us get an offer from us.
                    RoomAction::CreateOffer { socket_id },
                    RoomAction::Notify(Notice::info(format!("{username} joined the channel"))),
                ]
            }
            ServerSignal::UserDisconnected { socket_id } => {
                let mut actions = vec![RoomAction::DisconnectPeer {
                    socket_id: socket_id.clone(),
                }];
                if let Some(pos) = self
                    .participants
                    .iter()
                    .position(|p| p.socket_id == socket_id)
                {
                    let removed = self.participants.remove(pos);
                    actions.push(RoomAction::Emit(RoomEvent::ParticipantLeft {
                        socket_id: socket_id.clone(),
                    }));
                    actions.push(RoomAction::Notify(Notice::info(format!(
                        "{} left the channel",
                        removed.user_data.username
                    ))));
                }
                actions
            }
            ServerSignal::Signal { from, payload } => {
                vec![RoomAction::HandleSignal { from, payload }]
            }
            ServerSignal::ConnectError { message } => {
                log::warn!("signaling connection error: {message}");
                vec![RoomAction::Notify(Notice::error(
                    "voice connection problem, trying to recover",
                ))]
            }
        }
    }
}
