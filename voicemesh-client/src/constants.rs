//! Default tunables for the voice core.
//!
//! The detection and classification thresholds are empirically chosen
//! defaults. They seed [`VadConfig`](crate::audio::VadConfig) and
//! [`QualityConfig`](crate::connection::QualityConfig) rather than being
//! referenced directly, so hosts can tune them without patching the crate.

/// Public STUN servers used for NAT traversal.
///
/// TURN is intentionally absent from the default set; clients behind
/// symmetric NAT will fail to connect until a relay is configured.
pub const ICE_SERVERS: &[&str] = &[
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
    "stun:stun3.l.google.com:19302",
];

// Voice-activity detection
pub const VAD_FFT_SIZE: u32 = 256;
pub const VAD_ANALYSER_SMOOTHING: f64 = 0.8;
pub const VAD_VOLUME_ALPHA: f32 = 0.8;
/// Local capture runs hotter than decoded remote audio (gain staging, room
/// echo), so the local threshold sits above the remote one.
pub const VAD_LOCAL_THRESHOLD: f32 = 12.0;
pub const VAD_REMOTE_THRESHOLD: f32 = 8.0;

// Connection-quality monitoring
pub const QUALITY_TICK_MS: u32 = 5_000;
pub const POOR_BITRATE_FLOOR: u32 = 64_000;
pub const FAIR_BITRATE_FLOOR: u32 = 96_000;

// Reconnection
pub const RECONNECT_BASE_DELAY_MS: u32 = 1_000;
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;

// Opus tuning
pub const OPUS_MIN_PTIME_MS: u32 = 10;
pub const OPUS_MAX_PLAYBACK_RATE: u32 = 48_000;
pub const OPUS_MIN_PLAYBACK_RATE: u32 = 8_000;
pub const DEFAULT_AUDIO_BITRATE: u32 = 128_000;
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_CHANNEL_COUNT: u8 = 2;
