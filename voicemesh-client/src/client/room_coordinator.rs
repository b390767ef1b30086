//! The single entry/exit point for being in a voice room.
//!
//! Owns the roster and channel identity, bridges signaling events into the
//! peer manager, drives capture acquisition, and republishes domain events
//! over the event bus. Constructed once at application start with its
//! collaborators injected; clones share the same room.

use super::room_state::{JoinOutcome, RoomAction, RoomChannel, RoomState};
use crate::audio::{VoiceActivityAnalyzer, VoiceActivityEvent, VolumePreferences};
use crate::connection::quality::ConnectionQuality;
use crate::connection::PeerConnectionManager;
use crate::event_bus::EventBus;
use crate::events::{Notice, RoomEvent};
use crate::media::CaptureController;
use crate::signaling::{SignalingChannel, SignalingStatus};
use log::{debug, warn};
use std::cell::RefCell;
use std::rc::Rc;
use voicemesh_types::{Callback, ClientSignal, Participant, ServerSignal, LOCAL_STREAM_KEY};

/// Options for constructing a [`RoomCoordinator`].
pub struct RoomOptions {
    /// Credential forwarded with the join request.
    pub auth_token: String,
    /// Receives user-visible notices (peer joined/left, duplicate join,
    /// connectivity problems). Never raw technical error text.
    pub on_notice: Callback<Notice>,
}

struct Inner {
    options: RoomOptions,
    state: RoomState,
    peers: PeerConnectionManager,
    capture: Rc<dyn CaptureController>,
    voice: VoiceActivityAnalyzer,
    events: EventBus,
    signaling: Rc<dyn SignalingChannel>,
}

/// Cloneable handle to the room orchestrator.
#[derive(Clone)]
pub struct RoomCoordinator {
    inner: Rc<RefCell<Inner>>,
}

impl RoomCoordinator {
    pub fn new(
        options: RoomOptions,
        signaling: Rc<dyn SignalingChannel>,
        capture: Rc<dyn CaptureController>,
        events: EventBus,
    ) -> Self {
        let voice = VoiceActivityAnalyzer::default();
        let volumes = VolumePreferences::new();
        let outbound = {
            let signaling = Rc::clone(&signaling);
            Callback::from(move |signal: ClientSignal| signaling.send(signal))
        };
        let peers = PeerConnectionManager::new(
            Rc::clone(&capture),
            voice.clone(),
            volumes,
            outbound,
        );
        Self {
            inner: Rc::new(RefCell::new(Inner {
                options,
                state: RoomState::new(),
                peers,
                capture,
                voice,
                events,
                signaling,
            })),
        }
    }

    /// Callback for the host to feed inbound signaling events into.
    pub fn on_server_signal(&self) -> Callback<ServerSignal> {
        let this = self.clone();
        Callback::from(move |signal: ServerSignal| this.handle_server_signal(signal))
    }

    /// Callback for the host to feed signaling transport status into.
    pub fn on_signaling_status(&self) -> Callback<SignalingStatus> {
        let this = self.clone();
        Callback::from(move |status: SignalingStatus| match &status {
            SignalingStatus::Opened => debug!("signaling transport open"),
            SignalingStatus::Closed | SignalingStatus::Error(_) => {
                warn!("signaling transport lost: {status:?}");
                let notice = this.inner.borrow().options.on_notice.clone();
                notice.emit(Notice::error("voice connection problem, trying to recover"));
            }
        })
    }

    /// Join a voice room. Capture is only requested here, never while idle.
    /// Joining the current room again is an informational no-op; joining a
    /// different room disconnects from the current one first.
    pub fn connect_to_room(&self, room_id: u32, name: Option<String>) {
        let channel_name = name.unwrap_or_else(|| format!("Room {room_id}"));
        let outcome = self.inner.borrow().state.begin_join(room_id);
        match outcome {
            JoinOutcome::AlreadyJoined => {
                let (notice, current) = {
                    let guard = self.inner.borrow();
                    (
                        guard.options.on_notice.clone(),
                        guard.state.channel().map(|c| c.name.clone()),
                    )
                };
                let current = current.unwrap_or(channel_name);
                notice.emit(Notice::info(format!("already connected to {current}")));
                return;
            }
            JoinOutcome::SwitchingRooms(previous) => {
                debug!("switching from {} to {room_id}", previous.id);
                self.disconnect_from_room();
            }
            JoinOutcome::Idle => {}
        }

        let (signaling, capture, peers, voice, events, notice, token) = {
            let guard = self.inner.borrow();
            (
                Rc::clone(&guard.signaling),
                Rc::clone(&guard.capture),
                guard.peers.clone(),
                guard.voice.clone(),
                guard.events.clone(),
                guard.options.on_notice.clone(),
                guard.options.auth_token.clone(),
            )
        };

        // Re-register the voice-activity bridge; a previous disconnect
        // cleared all analyzer callbacks.
        voice.add_callback(self.voice_bridge());

        signaling.send(ClientSignal::JoinRoom { room_id, token });
        capture.init_media();
        peers.initialize_media();

        self.inner.borrow_mut().state.set_channel(RoomChannel {
            id: room_id,
            name: channel_name.clone(),
        });
        events.emit(RoomEvent::ChannelConnected {
            channel_id: room_id,
            channel_name: channel_name.clone(),
        });
        notice.emit(Notice::info(format!("connected to {channel_name}")));
    }

    /// Leave the current room: notify the server, tear down every peer,
    /// release capture, stop voice monitoring, reset state. No-op when not
    /// in a room.
    pub fn disconnect_from_room(&self) {
        let (signaling, peers, capture, voice, events, notice, in_room) = {
            let guard = self.inner.borrow();
            (
                Rc::clone(&guard.signaling),
                guard.peers.clone(),
                Rc::clone(&guard.capture),
                guard.voice.clone(),
                guard.events.clone(),
                guard.options.on_notice.clone(),
                guard.state.channel().is_some(),
            )
        };
        if !in_room {
            return;
        }

        signaling.send(ClientSignal::LeaveRoom);
        peers.disconnect();
        capture.cleanup();
        voice.cleanup();

        let previous = self.inner.borrow_mut().state.reset_on_disconnect();
        if let Some(previous) = previous {
            events.emit(RoomEvent::ChannelDisconnected {
                channel_id: previous.id,
            });
            notice.emit(Notice::info(format!("left {}", previous.name)));
        }
    }

    fn handle_server_signal(&self, signal: ServerSignal) {
        let (actions, peers, events, notice) = {
            let mut guard = self.inner.borrow_mut();
            let actions = guard.state.apply(signal);
            (
                actions,
                guard.peers.clone(),
                guard.events.clone(),
                guard.options.on_notice.clone(),
            )
        };
        for action in actions {
            match action {
                RoomAction::CreateOffer { socket_id } => peers.create_offer(&socket_id),
                RoomAction::DisconnectPeer { socket_id } => peers.disconnect_peer(&socket_id),
                RoomAction::HandleSignal { from, payload } => peers.handle_signal(&from, payload),
                RoomAction::Emit(event) => events.emit(event),
                RoomAction::Notify(n) => notice.emit(n),
            }
        }
    }

    fn voice_bridge(&self) -> Callback<VoiceActivityEvent> {
        let inner = Rc::clone(&self.inner);
        Callback::from(move |activity: VoiceActivityEvent| {
            let (to_emit, events) = {
                let mut guard = inner.borrow_mut();
                let mut to_emit = Vec::new();
                if activity.user_id == LOCAL_STREAM_KEY {
                    to_emit.push(RoomEvent::LocalSpeakingStateChanged {
                        is_speaking: activity.is_active,
                    });
                } else if guard.state.set_speaking(&activity.user_id, activity.is_active) {
                    to_emit.push(RoomEvent::ParticipantsUpdated(
                        guard.state.participants().to_vec(),
                    ));
                }
                (to_emit, guard.events.clone())
            };
            for event in to_emit {
                events.emit(event);
            }
        })
    }

    // ── Read accessors ──────────────────────────────────────────────────────

    pub fn current_channel(&self) -> Option<RoomChannel> {
        self.inner.borrow().state.channel().cloned()
    }

    /// Snapshot of the roster; callers never hold a live reference.
    pub fn participants(&self) -> Vec<Participant> {
        self.inner.borrow().state.participants().to_vec()
    }

    pub fn participant_speaking_state(&self, socket_id: &str) -> bool {
        self.inner.borrow().voice.user_activity(socket_id)
    }

    pub fn local_speaking_state(&self) -> bool {
        self.inner.borrow().voice.user_activity(LOCAL_STREAM_KEY)
    }

    pub fn participant_volume_level(&self, socket_id: &str) -> f32 {
        self.inner.borrow().voice.user_volume(socket_id)
    }

    pub fn local_volume_level(&self) -> f32 {
        self.inner.borrow().voice.user_volume(LOCAL_STREAM_KEY)
    }

    pub fn connection_quality(&self, socket_id: &str) -> Option<ConnectionQuality> {
        self.inner.borrow().peers.connection_quality(socket_id)
    }

    // ── Delegations for the UI ──────────────────────────────────────────────

    pub fn set_participant_volume(&self, socket_id: &str, volume: u8) {
        self.inner.borrow().peers.set_participant_volume(socket_id, volume);
    }

    pub fn set_remote_audio_muted(&self, muted: bool) {
        self.inner.borrow().peers.set_remote_audio_muted(muted);
    }
}
