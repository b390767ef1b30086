//! Per-peer connection entry: the RTCPeerConnection and every resource
//! hanging off it. Exactly one entry exists per remote socket id; the entry
//! owns its audio graph, timers and event closures, and tears all of them
//! down together.

use crate::connection::quality::ConnectionQuality;
use gloo::timers::callback::{Interval, Timeout};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{
    AudioContext, GainNode, MediaStream, MediaStreamAudioSourceNode, MediaStreamTrack,
    RtcIceCandidateInit, RtcPeerConnection, RtcPeerConnectionIceEvent, RtcTrackEvent,
};

/// Playback graph for one peer: stream source into a gain node into the
/// context destination. Remote audio gets no processing effects; effects
/// belong at the capture end, applying them again here would double up.
pub(crate) struct PeerAudio {
    pub context: AudioContext,
    pub source: MediaStreamAudioSourceNode,
    pub gain: GainNode,
}

/// Baseline for outbound-bitrate measurement between stats ticks.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StatsBaseline {
    pub at_ms: f64,
    pub bytes_sent: f64,
}

// Event closures must outlive the connection; they are stored here and
// dropped only when the entry closes.
pub(crate) struct PeerHandlers {
    pub _onicecandidate: Closure<dyn FnMut(RtcPeerConnectionIceEvent)>,
    pub _ontrack: Closure<dyn FnMut(RtcTrackEvent)>,
    pub _onstatechange: Closure<dyn FnMut()>,
}

pub(crate) struct PeerEntry {
    pub pc: RtcPeerConnection,
    /// Accumulates inbound tracks until the stream is playable.
    pub inbound: MediaStream,
    pub audio: Option<PeerAudio>,
    pub quality: Option<ConnectionQuality>,
    pub quality_monitor: Option<Interval>,
    pub stats_baseline: Option<StatsBaseline>,
    pub reconnect_attempts: u32,
    pub reconnect_timer: Option<Timeout>,
    /// Candidates that arrived before the remote description was applied;
    /// drained once it lands.
    pub pending_candidates: Vec<RtcIceCandidateInit>,
    /// Current outbound bitrate target in bits/s, after tier clamping and
    /// any quality adaptation.
    pub target_bitrate: u32,
    pub _handlers: PeerHandlers,
}

impl PeerEntry {
    /// Tear down the connection and every dependent resource. Safe to call
    /// on a partially-built entry.
    pub fn close(&mut self) {
        // Dropping a gloo timer cancels it.
        self.reconnect_timer = None;
        self.quality_monitor = None;
        for track in self.inbound.get_tracks().iter() {
            track.unchecked_into::<MediaStreamTrack>().stop();
        }
        if let Some(audio) = self.audio.take() {
            let _ = audio.source.disconnect();
            let _ = audio.gain.disconnect();
            let _ = audio.context.close();
        }
        self.pc.set_onicecandidate(None);
        self.pc.set_ontrack(None);
        self.pc.set_oniceconnectionstatechange(None);
        self.pc.close();
    }
}
