//! Signaling wire protocol.
//!
//! Every frame exchanged with the signaling server is JSON with an `event`
//! discriminator and an optional `data` body. Relayed peer-to-peer signals
//! carry a second discriminator, `type`, distinguishing offers, answers and
//! ICE candidates. Both levels are modeled as tagged unions so a malformed
//! frame fails deserialization at the boundary and never reaches the
//! negotiation code in a half-valid shape.

use crate::participant::Participant;
use serde::{Deserialize, Serialize};

/// ICE candidate fields relayed between peers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
}

/// Body of a relayed `signal` event, discriminated by `type`.
///
/// An offer or answer without an `sdp` field, or a candidate without a
/// `candidate` field, is rejected by serde before dispatch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalPayload {
    Offer { sdp: String },
    Answer { sdp: String },
    Candidate { candidate: IceCandidate },
}

impl SignalPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            SignalPayload::Offer { .. } => "offer",
            SignalPayload::Answer { .. } => "answer",
            SignalPayload::Candidate { .. } => "candidate",
        }
    }
}

/// Events the client sends to the signaling server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientSignal {
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: u32,
        token: String,
    },
    LeaveRoom,
    Signal {
        to: String,
        #[serde(flatten)]
        payload: SignalPayload,
    },
}

/// Events the signaling server pushes to the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerSignal {
    /// Roster snapshot sent right after a join is accepted. May still
    /// contain the local session's own socket id; the coordinator excludes
    /// it when replacing the roster.
    #[serde(rename_all = "camelCase")]
    Created {
        participants: Vec<Participant>,
        /// The local session's own socket id.
        #[serde(default)]
        self_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    UserConnected {
        socket_id: String,
        user_data: crate::participant::UserData,
    },
    UserDisconnected {
        #[serde(rename = "socketId")]
        socket_id: String,
    },
    Signal {
        from: String,
        #[serde(flatten)]
        payload: SignalPayload,
    },
    #[serde(rename = "connect_error")]
    ConnectError {
        message: String,
    },
}

impl ServerSignal {
    /// Parse one inbound text frame. `Err` carries the serde error for the
    /// boundary to log; the frame is then dropped.
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }
}

impl ClientSignal {
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::UserData;

    #[test]
    fn join_room_frame_shape() {
        let frame = ClientSignal::JoinRoom {
            room_id: 5,
            token: "tok".into(),
        }
        .to_frame()
        .unwrap();
        let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event"], "join-room");
        assert_eq!(v["data"]["roomId"], 5);
    }

    #[test]
    fn leave_room_has_no_data() {
        let frame = ClientSignal::LeaveRoom.to_frame().unwrap();
        let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event"], "leave-room");
        assert!(v.get("data").is_none());
    }

    #[test]
    fn outbound_signal_flattens_payload() {
        let frame = ClientSignal::Signal {
            to: "p1".into(),
            payload: SignalPayload::Offer { sdp: "v=0".into() },
        }
        .to_frame()
        .unwrap();
        let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["data"]["to"], "p1");
        assert_eq!(v["data"]["type"], "offer");
        assert_eq!(v["data"]["sdp"], "v=0");
    }

    #[test]
    fn inbound_offer_parses() {
        let frame = r#"{"event":"signal","data":{"from":"p2","type":"offer","sdp":"v=0"}}"#;
        match ServerSignal::from_frame(frame).unwrap() {
            ServerSignal::Signal { from, payload } => {
                assert_eq!(from, "p2");
                assert_eq!(payload, SignalPayload::Offer { sdp: "v=0".into() });
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn inbound_candidate_parses() {
        let frame = r#"{"event":"signal","data":{"from":"p2","type":"candidate",
            "candidate":{"candidate":"candidate:1 1 udp 1 1.2.3.4 5 typ host","sdpMid":"0","sdpMLineIndex":0}}}"#;
        match ServerSignal::from_frame(frame).unwrap() {
            ServerSignal::Signal {
                payload: SignalPayload::Candidate { candidate },
                ..
            } => {
                assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
                assert_eq!(candidate.sdp_m_line_index, Some(0));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn offer_without_sdp_is_rejected() {
        let frame = r#"{"event":"signal","data":{"from":"p2","type":"offer"}}"#;
        assert!(ServerSignal::from_frame(frame).is_err());
    }

    #[test]
    fn unknown_signal_type_is_rejected() {
        let frame = r#"{"event":"signal","data":{"from":"p2","type":"renegotiate","sdp":"x"}}"#;
        assert!(ServerSignal::from_frame(frame).is_err());
    }

    #[test]
    fn user_connected_parses_camel_case() {
        let frame = r#"{"event":"user-connected","data":{
            "socketId":"p3","userData":{"id":3,"username":"cy"}}}"#;
        match ServerSignal::from_frame(frame).unwrap() {
            ServerSignal::UserConnected {
                socket_id,
                user_data,
            } => {
                assert_eq!(socket_id, "p3");
                assert_eq!(
                    user_data,
                    UserData {
                        id: 3,
                        username: "cy".into(),
                        profile_picture: None,
                        role: Default::default(),
                    }
                );
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn roster_snapshot_parses() {
        let frame = r#"{"event":"created","data":{"participants":[
            {"socketId":"p1","userData":{"id":1,"username":"a"}},
            {"socketId":"p2","userData":{"id":2,"username":"b"},"micToggle":false}
        ]}}"#;
        match ServerSignal::from_frame(frame).unwrap() {
            ServerSignal::Created {
                participants,
                self_id,
            } => {
                assert_eq!(participants.len(), 2);
                assert!(!participants[1].mic_toggle);
                assert_eq!(self_id, None);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
