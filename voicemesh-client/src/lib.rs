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

//! Browser-side core of a mesh-topology voice chat client.
//!
//! Each participant holds one direct WebRTC connection to every other
//! participant; there is no media server. This crate takes care of the
//! negotiation, per-peer audio playback, connection-quality adaptation and
//! voice-activity detection, and makes no assumptions about the UI — state
//! changes surface as [`RoomEvent`]s on an [`EventBus`] and as plain
//! [`Notice`]s for toast-style display.
//!
//! # Outline of usage
//!
//! For more detailed documentation see the doc for each struct.
//!
//! ## Wiring and room control:
//! ```ignore
//! let events = EventBus::new();
//! let capture = Rc::new(BrowserCapture::new(CaptureConfig::default()));
//! let coordinator = RoomCoordinator::new(options, signaling, capture, events.clone());
//!
//! let signaling = WebSocketSignaling::connect(
//!     url,
//!     coordinator.on_server_signal(),
//!     coordinator.on_signaling_status(),
//! )?;
//!
//! coordinator.connect_to_room(5, Some("General".into()));
//! coordinator.disconnect_from_room();
//! ```
//!
//! ## Rendering state:
//! ```ignore
//! let mut rx = events.subscribe();
//! while let Ok(event) = rx.recv().await {
//!     match event { /* update the view */ }
//! }
//! ```

pub mod audio;
pub mod client;
pub mod connection;
pub mod constants;
pub mod event_bus;
pub mod events;
pub mod sdp;
pub mod signaling;

#[cfg(target_arch = "wasm32")]
pub mod media;

#[cfg(test)]
mod tests;

pub use audio::{ActivityDetector, VadConfig, VolumePreferences};
pub use client::{JoinOutcome, RoomAction, RoomChannel, RoomState};
pub use connection::{ConnectionQuality, QualityConfig, QualityLevel};
pub use event_bus::EventBus;
pub use events::{Notice, NoticeSeverity, RoomEvent};
pub use sdp::{apply_audio_tuning, AudioTuning};
pub use signaling::{SignalingChannel, SignalingStatus};

#[cfg(target_arch = "wasm32")]
pub use audio::VoiceActivityAnalyzer;
#[cfg(target_arch = "wasm32")]
pub use client::{RoomCoordinator, RoomOptions};
#[cfg(target_arch = "wasm32")]
pub use connection::PeerConnectionManager;
#[cfg(target_arch = "wasm32")]
pub use media::{BrowserCapture, CaptureConfig, CaptureController};
#[cfg(target_arch = "wasm32")]
pub use signaling::WebSocketSignaling;
