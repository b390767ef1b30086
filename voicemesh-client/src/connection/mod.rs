//! Per-peer transport management.

pub mod quality;
pub mod reconnect;

#[cfg(target_arch = "wasm32")]
mod peer;
#[cfg(target_arch = "wasm32")]
pub mod peer_connection_manager;

pub use quality::{adapted_bitrate, classify, ConnectionQuality, QualityConfig, QualityLevel};
pub use reconnect::reconnect_delay_ms;

#[cfg(target_arch = "wasm32")]
pub use peer_connection_manager::PeerConnectionManager;
