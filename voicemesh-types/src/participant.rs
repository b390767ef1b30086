//! Participant and roster data.
//!
//! A [`Participant`] is one remote member of the current voice room. The
//! roster is owned exclusively by the room coordinator; everything else
//! refers to participants by their `socket_id`.

use serde::{Deserialize, Serialize};

/// Server-side identity of a user, as relayed by the signaling server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Member,
    Moderator,
    Admin,
}

/// One remote member of the voice room.
///
/// `socket_id` is unique and stable for the lifetime of the member's
/// signaling session. `is_speaking` is derived from voice-activity
/// monitoring and changes continuously; it is never part of the wire
/// roster, so it deserializes to `false`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub socket_id: String,
    pub user_data: UserData,
    /// Self-reported mic-on intent of the remote member.
    #[serde(default = "default_mic_toggle")]
    pub mic_toggle: bool,
    #[serde(default)]
    pub is_speaking: bool,
}

fn default_mic_toggle() -> bool {
    true
}

impl Participant {
    pub fn new(socket_id: String, user_data: UserData) -> Self {
        Self {
            socket_id,
            user_data,
            mic_toggle: true,
            is_speaking: false,
        }
    }
}
