//! Per-participant playback volume preferences.
//!
//! The in-memory map is authoritative; on the browser target it is mirrored
//! to local storage so preferences survive reloads. Handles are cheap
//! clones sharing one map, constructed once at startup and passed to
//! whoever needs them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub const DEFAULT_VOLUME: u8 = 100;

#[cfg(target_arch = "wasm32")]
const STORAGE_KEY: &str = "voicemesh:participant-volumes";

#[derive(Clone, Debug, Default)]
pub struct VolumePreferences {
    volumes: Rc<RefCell<HashMap<String, u8>>>,
}

impl VolumePreferences {
    pub fn new() -> Self {
        let store = Self::default();
        store.load();
        store
    }

    /// Stored volume for a participant, 0–100. Unknown participants play at
    /// full volume.
    pub fn participant_volume(&self, socket_id: &str) -> u8 {
        self.volumes
            .borrow()
            .get(socket_id)
            .copied()
            .unwrap_or(DEFAULT_VOLUME)
    }

    /// Gain-node value for a participant, 0.0–1.0.
    pub fn gain_for(&self, socket_id: &str) -> f32 {
        f32::from(self.participant_volume(socket_id)) / 100.0
    }

    pub fn set_participant_volume(&self, socket_id: &str, volume: u8) {
        self.volumes
            .borrow_mut()
            .insert(socket_id.to_string(), volume.min(100));
        self.save();
    }

    pub fn remove_participant(&self, socket_id: &str) {
        if self.volumes.borrow_mut().remove(socket_id).is_some() {
            self.save();
        }
    }

    pub fn reset_all(&self) {
        self.volumes.borrow_mut().clear();
        self.save();
    }

    #[cfg(target_arch = "wasm32")]
    fn load(&self) {
        use gloo::storage::{LocalStorage, Storage};
        if let Ok(saved) = LocalStorage::get::<HashMap<String, u8>>(STORAGE_KEY) {
            *self.volumes.borrow_mut() = saved;
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn save(&self) {
        use gloo::storage::{LocalStorage, Storage};
        if let Err(e) = LocalStorage::set(STORAGE_KEY, &*self.volumes.borrow()) {
            log::warn!("failed to persist volume preferences: {e}");
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn load(&self) {}

    #[cfg(not(target_arch = "wasm32"))]
    fn save(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_participant_plays_at_full_volume() {
        let store = VolumePreferences::new();
        assert_eq!(store.participant_volume("p1"), 100);
        assert!((store.gain_for("p1") - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn set_and_read_back() {
        let store = VolumePreferences::new();
        store.set_participant_volume("p1", 40);
        assert_eq!(store.participant_volume("p1"), 40);
        assert!((store.gain_for("p1") - 0.4).abs() < 1e-6);
    }

    #[test]
    fn volume_clamps_to_100() {
        let store = VolumePreferences::new();
        store.set_participant_volume("p1", 250);
        assert_eq!(store.participant_volume("p1"), 100);
    }

    #[test]
    fn remove_restores_default() {
        let store = VolumePreferences::new();
        store.set_participant_volume("p1", 10);
        store.remove_participant("p1");
        assert_eq!(store.participant_volume("p1"), 100);
        // Removing again is a no-op.
        store.remove_participant("p1");
    }

    #[test]
    fn reset_clears_every_preference() {
        let store = VolumePreferences::new();
        store.set_participant_volume("p1", 10);
        store.set_participant_volume("p2", 20);
        store.reset_all();
        assert_eq!(store.participant_volume("p1"), 100);
        assert_eq!(store.participant_volume("p2"), 100);
    }

    #[test]
    fn clones_share_state() {
        let store = VolumePreferences::new();
        let clone = store.clone();
        clone.set_participant_volume("p1", 55);
        assert_eq!(store.participant_volume("p1"), 55);
    }
}
