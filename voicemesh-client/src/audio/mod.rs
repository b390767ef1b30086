//! Voice-activity detection and per-participant audio preferences.

pub mod detector;
pub mod volume_store;

#[cfg(target_arch = "wasm32")]
pub mod voice_activity;

pub use detector::{mean_magnitude, ActivityDetector, VadConfig};
pub use volume_store::VolumePreferences;

#[cfg(target_arch = "wasm32")]
pub use voice_activity::{VoiceActivityAnalyzer, VoiceActivityEvent};
