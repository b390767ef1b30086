//! A whole room session driven through the state reducer: join, roster,
//! churn, speaking updates, disconnect.

use crate::client::{JoinOutcome, RoomAction, RoomChannel, RoomState};
use crate::events::RoomEvent;
use voicemesh_types::{Participant, ServerSignal, SignalPayload, UserData};

fn user(id: u64, username: &str) -> UserData {
    UserData {
        id,
        username: username.into(),
        profile_picture: None,
        role: Default::default(),
    }
}

fn roster_ids(state: &RoomState) -> Vec<String> {
    state
        .participants()
        .iter()
        .map(|p| p.socket_id.clone())
        .collect()
}

#[test]
fn full_session_lifecycle() {
    let mut state = RoomState::new();

    // Join room 10.
    assert_eq!(state.begin_join(10), JoinOutcome::Idle);
    state.set_channel(RoomChannel {
        id: 10,
        name: "General".into(),
    });

    // Server roster: one pre-existing peer plus ourselves.
    let actions = state.apply(ServerSignal::Created {
        participants: vec![
            Participant::new("p1".into(), user(1, "ada")),
            Participant::new("me".into(), user(99, "self")),
        ],
        self_id: Some("me".into()),
    });
    assert_eq!(roster_ids(&state), vec!["p1"]);
    // Pre-existing peers offer to us, not the other way around.
    assert!(!actions
        .iter()
        .any(|a| matches!(a, RoomAction::CreateOffer { .. })));

    // p1 sends us an offer; it is dispatched verbatim to the peer manager.
    let actions = state.apply(ServerSignal::Signal {
        from: "p1".into(),
        payload: SignalPayload::Offer { sdp: "v=0".into() },
    });
    assert!(matches!(
        &actions[..],
        [RoomAction::HandleSignal { from, .. }] if from == "p1"
    ));

    // A newcomer appears; we are the offering side for them.
    let actions = state.apply(ServerSignal::UserConnected {
        socket_id: "p2".into(),
        user_data: user(2, "bo"),
    });
    assert_eq!(roster_ids(&state), vec!["p1", "p2"]);
    assert!(actions.contains(&RoomAction::CreateOffer {
        socket_id: "p2".into()
    }));
    assert!(actions.iter().any(|a| matches!(
        a,
        RoomAction::Emit(RoomEvent::ParticipantJoined(p)) if p.socket_id == "p2"
    )));

    // Voice activity flows into the roster.
    assert!(state.set_speaking("p1", true));
    assert!(state.participant("p1").unwrap().is_speaking);

    // A second join of the same room is a no-op.
    assert_eq!(state.begin_join(10), JoinOutcome::AlreadyJoined);

    // p1 leaves; their connection is torn down and roster shrinks.
    let actions = state.apply(ServerSignal::UserDisconnected {
        socket_id: "p1".into(),
    });
    assert_eq!(roster_ids(&state), vec!["p2"]);
    assert!(actions.contains(&RoomAction::DisconnectPeer {
        socket_id: "p1".into()
    }));

    // Disconnecting resets all derived state and reports the old channel.
    state.set_speaking("p2", true);
    let previous = state.reset_on_disconnect();
    assert_eq!(
        previous,
        Some(RoomChannel {
            id: 10,
            name: "General".into()
        })
    );
    assert!(state.participants().iter().all(|p| !p.is_speaking));
    assert_eq!(state.begin_join(10), JoinOutcome::Idle);
}

#[test]
fn roster_replacement_drops_stale_speaking_flags() {
    let mut state = RoomState::new();
    state.apply(ServerSignal::UserConnected {
        socket_id: "p1".into(),
        user_data: user(1, "ada"),
    });
    state.set_speaking("p1", true);

    // A fresh snapshot arrives carrying p1 again; the derived flag does not
    // leak through the wire roster.
    let mut snapshot = Participant::new("p1".into(), user(1, "ada"));
    snapshot.is_speaking = true;
    state.apply(ServerSignal::Created {
        participants: vec![snapshot],
        self_id: None,
    });
    assert!(!state.participant("p1").unwrap().is_speaking);
}
