//! The WebRTC transport layer: one connection per remote participant,
//! manual SDP/ICE negotiation, and a quality-adapted audio graph per peer.
//!
//! Every async entry point catches its own failures; a broken negotiation
//! step logs, leaves the peer eligible for reconnection, and never crashes
//! the room.

use super::peer::{PeerAudio, PeerEntry, PeerHandlers, StatsBaseline};
use super::quality::{adapted_bitrate, classify, ConnectionQuality, QualityConfig};
use super::reconnect::reconnect_delay_ms;
use crate::audio::{VoiceActivityAnalyzer, VolumePreferences};
use crate::constants::{ICE_SERVERS, QUALITY_TICK_MS};
use crate::media::CaptureController;
use crate::sdp::{apply_audio_tuning, target_bitrate};
use gloo::timers::callback::{Interval, Timeout};
use log::{debug, error, info, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use voicemesh_diagnostics::{metric, now_ms, publish, DiagEvent, Severity};
use voicemesh_types::{
    Callback, ClientSignal, IceCandidate, SignalPayload, LOCAL_STREAM_KEY,
};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{
    MediaStream, MediaStreamTrack, RtcConfiguration, RtcIceCandidateInit, RtcIceConnectionState,
    RtcIceServer, RtcOfferOptions, RtcPeerConnection, RtcPeerConnectionIceEvent, RtcRtpSender,
    RtcSdpType, RtcSessionDescriptionInit, RtcTrackEvent,
};

struct Inner {
    peers: HashMap<String, PeerEntry>,
    capture: Rc<dyn CaptureController>,
    voice: VoiceActivityAnalyzer,
    volumes: VolumePreferences,
    /// Delivery boundary for outbound signals; the coordinator wires this
    /// to the signaling channel.
    outbound: Callback<ClientSignal>,
    quality_config: QualityConfig,
    remote_muted: bool,
    /// Whether the capture-stream subscription has been wired; the
    /// subscription is registered once for the manager's lifetime.
    media_wired: bool,
}

/// Cloneable handle to the per-peer transport layer.
#[derive(Clone)]
pub struct PeerConnectionManager {
    inner: Rc<RefCell<Inner>>,
}

impl PeerConnectionManager {
    pub fn new(
        capture: Rc<dyn CaptureController>,
        voice: VoiceActivityAnalyzer,
        volumes: VolumePreferences,
        outbound: Callback<ClientSignal>,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                peers: HashMap::new(),
                capture,
                voice,
                volumes,
                outbound,
                quality_config: QualityConfig::default(),
                remote_muted: false,
                media_wired: false,
            })),
        }
    }

    /// Wire the capture subscription: whenever the externally-owned capture
    /// stream is replaced, swap the outbound track on every live connection
    /// and restart local voice monitoring. Also primes monitoring if a
    /// stream already exists.
    pub fn initialize_media(&self) {
        let inner = Rc::clone(&self.inner);
        let (capture, voice, already_wired) = {
            let mut guard = self.inner.borrow_mut();
            let already = std::mem::replace(&mut guard.media_wired, true);
            (Rc::clone(&guard.capture), guard.voice.clone(), already)
        };
        if !already_wired {
            capture.on_stream_changed(Callback::from(move |stream: Option<MediaStream>| {
                let voice = inner.borrow().voice.clone();
                match stream {
                    Some(stream) => {
                        voice.start_monitoring(LOCAL_STREAM_KEY, &stream);
                        resend_local_stream(Rc::clone(&inner));
                    }
                    None => voice.stop_monitoring(LOCAL_STREAM_KEY),
                }
            }));
        }
        if let Some(stream) = capture.stream() {
            voice.start_monitoring(LOCAL_STREAM_KEY, &stream);
        }
    }

    /// Create (or reuse) the connection for `peer_id` and send it an offer.
    pub fn create_offer(&self, peer_id: &str) {
        spawn_offer(Rc::clone(&self.inner), peer_id.to_string());
    }

    /// Answer a previously-applied remote offer. Requires the connection
    /// for `peer_id` to exist already.
    pub fn create_answer(&self, peer_id: &str) {
        let inner = Rc::clone(&self.inner);
        let peer_id = peer_id.to_string();
        spawn_local(async move {
            if let Err(e) = answer_task(inner, &peer_id).await {
                error!("failed to create answer for {peer_id}: {e:?}");
            }
        });
    }

    /// Dispatch one relayed signal from a remote peer.
    pub fn handle_signal(&self, from: &str, payload: SignalPayload) {
        let inner = Rc::clone(&self.inner);
        let from = from.to_string();
        spawn_local(async move {
            let kind = payload.kind();
            if let Err(e) = signal_task(inner, &from, payload).await {
                error!("failed to handle {kind} from {from}: {e:?}");
            }
        });
    }

    /// Replace the outbound audio track on every live connection with the
    /// current capture track, reapplying mute state and the current bitrate
    /// target. Logged no-op when no capture stream exists.
    pub fn resend_local_stream(&self) {
        resend_local_stream(Rc::clone(&self.inner));
    }

    /// Zero every peer's output gain, or restore it from the stored volume
    /// preferences.
    pub fn set_remote_audio_muted(&self, muted: bool) {
        let mut inner = self.inner.borrow_mut();
        inner.remote_muted = muted;
        let volumes = inner.volumes.clone();
        for (peer_id, entry) in inner.peers.iter() {
            if let Some(audio) = &entry.audio {
                let level = if muted { 0.0 } else { volumes.gain_for(peer_id) };
                audio.gain.gain().set_value(level);
            }
        }
    }

    /// Set one peer's playback volume (0–100) and persist the preference.
    pub fn set_participant_volume(&self, peer_id: &str, volume: u8) {
        let inner = self.inner.borrow();
        inner.volumes.set_participant_volume(peer_id, volume);
        if !inner.remote_muted {
            if let Some(audio) = inner.peers.get(peer_id).and_then(|e| e.audio.as_ref()) {
                audio.gain.gain().set_value(inner.volumes.gain_for(peer_id));
            }
        }
    }

    /// Tear down one peer: connection, inbound tracks, audio graph, timers,
    /// monitors and volume preference. Fully idempotent.
    pub fn disconnect_peer(&self, peer_id: &str) {
        let (entry, voice, volumes) = {
            let mut inner = self.inner.borrow_mut();
            (
                inner.peers.remove(peer_id),
                inner.voice.clone(),
                inner.volumes.clone(),
            )
        };
        if let Some(mut entry) = entry {
            info!("disconnecting peer {peer_id}");
            entry.close();
        }
        voice.stop_monitoring(peer_id);
        volumes.remove_participant(peer_id);
    }

    /// Full teardown: every peer, local capture tracks, all volume
    /// preferences, and voice monitoring as a whole.
    pub fn disconnect(&self) {
        let (entries, capture, voice, volumes) = {
            let mut inner = self.inner.borrow_mut();
            let entries: Vec<(String, PeerEntry)> = inner.peers.drain().collect();
            (
                entries,
                Rc::clone(&inner.capture),
                inner.voice.clone(),
                inner.volumes.clone(),
            )
        };
        for (peer_id, mut entry) in entries {
            debug!("closing connection to {peer_id}");
            entry.close();
            voice.stop_monitoring(&peer_id);
        }
        if let Some(stream) = capture.stream() {
            crate::media::stop_tracks(&stream);
        }
        volumes.reset_all();
        voice.cleanup();
    }

    /// Latest quality snapshot for a peer, if monitoring has produced one.
    pub fn connection_quality(&self, peer_id: &str) -> Option<ConnectionQuality> {
        self.inner.borrow().peers.get(peer_id).and_then(|e| e.quality)
    }

    pub fn has_peer(&self, peer_id: &str) -> bool {
        self.inner.borrow().peers.contains_key(peer_id)
    }

    pub fn peer_count(&self) -> usize {
        self.inner.borrow().peers.len()
    }
}

// ── Negotiation tasks ────────────────────────────────────────────────────────

fn spawn_offer(inner: Rc<RefCell<Inner>>, peer_id: String) {
    spawn_local(async move {
        if let Err(e) = offer_task(Rc::clone(&inner), &peer_id).await {
            error!("failed to create offer for {peer_id}: {e:?}");
        }
    });
}

async fn offer_task(inner: Rc<RefCell<Inner>>, peer_id: &str) -> Result<(), JsValue> {
    let (pc, tuning, outbound) = {
        let mut guard = inner.borrow_mut();
        ensure_entry(&mut guard, &inner, peer_id)?;
        let entry = guard
            .peers
            .get(peer_id)
            .ok_or_else(|| JsValue::from_str("entry vanished"))?;
        (entry.pc.clone(), guard.capture.tuning(), guard.outbound.clone())
    };
    if let Some(stream) = inner.borrow().capture.stream() {
        attach_local_tracks(&pc, &stream);
    }

    let options = RtcOfferOptions::new();
    options.set_offer_to_receive_audio(true);
    options.set_offer_to_receive_video(false);
    let offer = JsFuture::from(pc.create_offer_with_rtc_offer_options(&options)).await?;
    let sdp = description_sdp(&offer)?;
    let tuned = apply_audio_tuning(&sdp, &tuning).map_err(to_js_error)?;

    let description = RtcSessionDescriptionInit::new(RtcSdpType::Offer);
    description.set_sdp(&tuned);
    JsFuture::from(pc.set_local_description(&description)).await?;

    debug!("sending offer to {peer_id}");
    outbound.emit(ClientSignal::Signal {
        to: peer_id.to_string(),
        payload: SignalPayload::Offer { sdp: tuned },
    });
    Ok(())
}

async fn answer_task(inner: Rc<RefCell<Inner>>, peer_id: &str) -> Result<(), JsValue> {
    let Some((pc, tuning, outbound)) = ({
        let guard = inner.borrow();
        guard.peers.get(peer_id).map(|entry| {
            (entry.pc.clone(), guard.capture.tuning(), guard.outbound.clone())
        })
    }) else {
        warn!("cannot answer {peer_id}: no connection for that peer");
        return Ok(());
    };

    let answer = JsFuture::from(pc.create_answer()).await?;
    let sdp = description_sdp(&answer)?;
    let tuned = apply_audio_tuning(&sdp, &tuning).map_err(to_js_error)?;

    let description = RtcSessionDescriptionInit::new(RtcSdpType::Answer);
    description.set_sdp(&tuned);
    JsFuture::from(pc.set_local_description(&description)).await?;

    debug!("sending answer to {peer_id}");
    outbound.emit(ClientSignal::Signal {
        to: peer_id.to_string(),
        payload: SignalPayload::Answer { sdp: tuned },
    });
    Ok(())
}

async fn signal_task(
    inner: Rc<RefCell<Inner>>,
    from: &str,
    payload: SignalPayload,
) -> Result<(), JsValue> {
    match payload {
        SignalPayload::Offer { sdp } => {
            let (pc, tuning) = {
                let mut guard = inner.borrow_mut();
                ensure_entry(&mut guard, &inner, from)?;
                let entry = guard
                    .peers
                    .get(from)
                    .ok_or_else(|| JsValue::from_str("entry vanished"))?;
                (entry.pc.clone(), guard.capture.tuning())
            };
            let tuned = apply_audio_tuning(&sdp, &tuning).map_err(to_js_error)?;
            let description = RtcSessionDescriptionInit::new(RtcSdpType::Offer);
            description.set_sdp(&tuned);
            JsFuture::from(pc.set_remote_description(&description)).await?;
            drain_pending_candidates(&inner, from).await;

            // We were offered; attach our tracks and answer.
            if let Some(stream) = inner.borrow().capture.stream() {
                attach_local_tracks(&pc, &stream);
            }
            answer_task(inner, from).await
        }
        SignalPayload::Answer { sdp } => {
            let Some((pc, tuning)) = ({
                let guard = inner.borrow();
                guard
                    .peers
                    .get(from)
                    .map(|entry| (entry.pc.clone(), guard.capture.tuning()))
            }) else {
                warn!("answer from {from} without a connection; dropping");
                return Ok(());
            };
            let tuned = apply_audio_tuning(&sdp, &tuning).map_err(to_js_error)?;
            let description = RtcSessionDescriptionInit::new(RtcSdpType::Answer);
            description.set_sdp(&tuned);
            JsFuture::from(pc.set_remote_description(&description)).await?;
            drain_pending_candidates(&inner, from).await;
            Ok(())
        }
        SignalPayload::Candidate { candidate } => {
            let init = candidate_init(&candidate);
            let pc = {
                let mut guard = inner.borrow_mut();
                let Some(entry) = guard.peers.get_mut(from) else {
                    warn!("candidate from {from} without a connection; dropping");
                    return Ok(());
                };
                if entry.pc.remote_description().is_none() {
                    // Too early; park it until the description lands.
                    entry.pending_candidates.push(init);
                    return Ok(());
                }
                entry.pc.clone()
            };
            JsFuture::from(pc.add_ice_candidate_with_opt_rtc_ice_candidate_init(Some(&init)))
                .await?;
            Ok(())
        }
    }
}

async fn drain_pending_candidates(inner: &Rc<RefCell<Inner>>, peer_id: &str) {
    let (pc, pending) = {
        let mut guard = inner.borrow_mut();
        let Some(entry) = guard.peers.get_mut(peer_id) else {
            return;
        };
        (entry.pc.clone(), std::mem::take(&mut entry.pending_candidates))
    };
    for init in pending {
        if let Err(e) =
            JsFuture::from(pc.add_ice_candidate_with_opt_rtc_ice_candidate_init(Some(&init))).await
        {
            warn!("failed to add queued candidate for {peer_id}: {e:?}");
        }
    }
}

fn candidate_init(candidate: &IceCandidate) -> RtcIceCandidateInit {
    let init = RtcIceCandidateInit::new(&candidate.candidate);
    init.set_sdp_mid(candidate.sdp_mid.as_deref());
    init.set_sdp_m_line_index(candidate.sdp_m_line_index);
    init
}

fn description_sdp(description: &JsValue) -> Result<String, JsValue> {
    js_sys::Reflect::get(description, &JsValue::from_str("sdp"))?
        .as_string()
        .ok_or_else(|| JsValue::from_str("description carries no sdp"))
}

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

// ── Entry construction ───────────────────────────────────────────────────────

/// Create the connection entry for `peer_id` if none exists. Never replaces
/// a live entry: one connection per peer, always.
fn ensure_entry(
    guard: &mut Inner,
    inner: &Rc<RefCell<Inner>>,
    peer_id: &str,
) -> Result<(), JsValue> {
    if guard.peers.contains_key(peer_id) {
        return Ok(());
    }
    info!("creating peer connection for {peer_id}");

    let config = RtcConfiguration::new();
    let servers = js_sys::Array::new();
    let server = RtcIceServer::new();
    let urls = js_sys::Array::new();
    for url in ICE_SERVERS {
        urls.push(&JsValue::from_str(url));
    }
    server.set_urls(&urls);
    servers.push(&server);
    config.set_ice_servers(&servers);
    let pc = RtcPeerConnection::new_with_configuration(&config)?;

    let onicecandidate = {
        let outbound = guard.outbound.clone();
        let peer_id = peer_id.to_string();
        Closure::<dyn FnMut(RtcPeerConnectionIceEvent)>::new(move |ev: RtcPeerConnectionIceEvent| {
            if let Some(candidate) = ev.candidate() {
                outbound.emit(ClientSignal::Signal {
                    to: peer_id.clone(),
                    payload: SignalPayload::Candidate {
                        candidate: IceCandidate {
                            candidate: candidate.candidate(),
                            sdp_mid: candidate.sdp_mid(),
                            sdp_m_line_index: candidate.sdp_m_line_index(),
                        },
                    },
                });
            }
        })
    };
    pc.set_onicecandidate(Some(onicecandidate.as_ref().unchecked_ref()));

    let ontrack = {
        let inner = Rc::clone(inner);
        let peer_id = peer_id.to_string();
        Closure::<dyn FnMut(RtcTrackEvent)>::new(move |ev: RtcTrackEvent| {
            handle_remote_track(&inner, &peer_id, ev.track());
        })
    };
    pc.set_ontrack(Some(ontrack.as_ref().unchecked_ref()));

    let onstatechange = {
        let inner = Rc::clone(inner);
        let peer_id = peer_id.to_string();
        let pc = pc.clone();
        Closure::<dyn FnMut()>::new(move || {
            handle_connection_state(&inner, &peer_id, pc.ice_connection_state());
        })
    };
    pc.set_oniceconnectionstatechange(Some(onstatechange.as_ref().unchecked_ref()));

    let inbound = MediaStream::new()?;
    let target = target_bitrate(&guard.capture.tuning());
    guard.peers.insert(
        peer_id.to_string(),
        PeerEntry {
            pc,
            inbound,
            audio: None,
            quality: None,
            quality_monitor: None,
            stats_baseline: None,
            reconnect_attempts: 0,
            reconnect_timer: None,
            pending_candidates: Vec::new(),
            target_bitrate: target,
            _handlers: PeerHandlers {
                _onicecandidate: onicecandidate,
                _ontrack: ontrack,
                _onstatechange: onstatechange,
            },
        },
    );
    Ok(())
}

fn attach_local_tracks(pc: &RtcPeerConnection, stream: &MediaStream) {
    let already_sending = pc.get_senders().iter().any(|sender| {
        sender
            .unchecked_into::<RtcRtpSender>()
            .track()
            .is_some_and(|t| t.kind() == "audio")
    });
    if already_sending {
        return;
    }
    match first_audio_track(stream) {
        Some(track) => {
            pc.add_track(&track, stream, &js_sys::Array::new());
        }
        None => warn!("no local audio track to attach"),
    }
}

fn first_audio_track(stream: &MediaStream) -> Option<MediaStreamTrack> {
    let tracks = stream.get_audio_tracks();
    if tracks.length() == 0 {
        None
    } else {
        Some(tracks.get(0).unchecked_into())
    }
}

// ── Remote media ─────────────────────────────────────────────────────────────

fn handle_remote_track(inner: &Rc<RefCell<Inner>>, peer_id: &str, track: MediaStreamTrack) {
    let mut guard = inner.borrow_mut();
    let remote_muted = guard.remote_muted;
    let volumes = guard.volumes.clone();
    let voice = guard.voice.clone();
    let Some(entry) = guard.peers.get_mut(peer_id) else {
        return;
    };
    debug!("remote {} track from {peer_id}", track.kind());
    entry.inbound.add_track(&track);
    if entry.audio.is_some() || entry.inbound.get_audio_tracks().length() == 0 {
        return;
    }
    match build_peer_audio(entry, peer_id, remote_muted, &volumes) {
        Ok(audio) => entry.audio = Some(audio),
        Err(e) => {
            error!("failed to build audio graph for {peer_id}: {e:?}");
            return;
        }
    }
    let monitored = entry.inbound.clone();
    start_quality_monitor(inner, &mut guard, peer_id);
    drop(guard);
    voice.start_monitoring(peer_id, &monitored);
}

fn build_peer_audio(
    entry: &PeerEntry,
    peer_id: &str,
    remote_muted: bool,
    volumes: &VolumePreferences,
) -> Result<PeerAudio, JsValue> {
    let context = web_sys::AudioContext::new()?;
    let source = context.create_media_stream_source(&entry.inbound)?;
    let gain = context.create_gain()?;
    let level = if remote_muted { 0.0 } else { volumes.gain_for(peer_id) };
    gain.gain().set_value(level);
    source.connect_with_audio_node(&gain)?;
    gain.connect_with_audio_node(&context.destination())?;
    Ok(PeerAudio { context, source, gain })
}

// ── Connection state / reconnection ──────────────────────────────────────────

fn handle_connection_state(
    inner: &Rc<RefCell<Inner>>,
    peer_id: &str,
    state: RtcIceConnectionState,
) {
    debug!("{peer_id} ice connection state: {state:?}");
    match state {
        RtcIceConnectionState::Connected | RtcIceConnectionState::Completed => {
            let mut guard = inner.borrow_mut();
            if let Some(entry) = guard.peers.get_mut(peer_id) {
                entry.reconnect_attempts = 0;
                // A pending re-offer would now be stale.
                entry.reconnect_timer = None;
            }
        }
        RtcIceConnectionState::Failed | RtcIceConnectionState::Disconnected => {
            schedule_reconnect(inner, peer_id);
        }
        _ => {}
    }
}

fn schedule_reconnect(inner: &Rc<RefCell<Inner>>, peer_id: &str) {
    let mut guard = inner.borrow_mut();
    let Some(entry) = guard.peers.get_mut(peer_id) else {
        return;
    };
    if entry.reconnect_timer.is_some() {
        return;
    }
    let Some(delay_ms) = reconnect_delay_ms(entry.reconnect_attempts) else {
        warn!("giving up on {peer_id} after {} reconnection attempts", entry.reconnect_attempts);
        publish(DiagEvent {
            subsystem: "peer",
            stream_id: Some(peer_id.to_string()),
            severity: Severity::Error,
            ts_ms: now_ms(),
            metrics: vec![metric!("reconnect_abandoned", entry.reconnect_attempts)],
        });
        return;
    };
    entry.reconnect_attempts += 1;
    info!(
        "scheduling reconnection attempt {} for {peer_id} in {delay_ms}ms",
        entry.reconnect_attempts
    );
    publish(DiagEvent {
        subsystem: "peer",
        stream_id: Some(peer_id.to_string()),
        severity: Severity::Warning,
        ts_ms: now_ms(),
        metrics: vec![
            metric!("reconnect_attempt", entry.reconnect_attempts),
            metric!("delay_ms", delay_ms),
        ],
    });
    let timer = {
        let inner = Rc::clone(inner);
        let peer_id = peer_id.to_string();
        Timeout::new(delay_ms, move || {
            if let Some(entry) = inner.borrow_mut().peers.get_mut(&peer_id) {
                entry.reconnect_timer = None;
            }
            spawn_offer(Rc::clone(&inner), peer_id.clone());
        })
    };
    entry.reconnect_timer = Some(timer);
}

// ── Track replacement ────────────────────────────────────────────────────────

fn resend_local_stream(inner: Rc<RefCell<Inner>>) {
    spawn_local(async move {
        let (track, muted, work) = {
            let guard = inner.borrow();
            let Some(stream) = guard.capture.stream() else {
                warn!("no local stream to resend");
                return;
            };
            let Some(track) = first_audio_track(&stream) else {
                warn!("local stream has no audio track to resend");
                return;
            };
            let work: Vec<(String, RtcPeerConnection, u32)> = guard
                .peers
                .iter()
                .map(|(id, e)| (id.clone(), e.pc.clone(), e.target_bitrate))
                .collect();
            (track, guard.capture.is_microphone_muted(), work)
        };
        track.set_enabled(!muted);
        for (peer_id, pc, bitrate) in work {
            let Some(sender) = audio_sender(&pc) else {
                continue;
            };
            if let Err(e) = JsFuture::from(sender.replace_track(Some(&track))).await {
                error!("failed to replace outbound track for {peer_id}: {e:?}");
                continue;
            }
            if let Err(e) = apply_sender_bitrate(&sender, bitrate).await {
                warn!("failed to push bitrate to {peer_id}: {e:?}");
            }
        }
    });
}

fn audio_sender(pc: &RtcPeerConnection) -> Option<RtcRtpSender> {
    pc.get_senders()
        .iter()
        .map(|s| s.unchecked_into::<RtcRtpSender>())
        .find(|s| s.track().is_some_and(|t| t.kind() == "audio"))
}

/// Push a max-bitrate target into the sender's encoding parameters. Purely
/// local; the peer is not renegotiated with.
async fn apply_sender_bitrate(sender: &RtcRtpSender, bitrate_bps: u32) -> Result<(), JsValue> {
    let parameters = sender.get_parameters();
    let encodings = js_sys::Reflect::get(&parameters, &JsValue::from_str("encodings"))?;
    let encodings: js_sys::Array = if encodings.is_undefined() || encodings.is_null() {
        let fresh = js_sys::Array::new();
        js_sys::Reflect::set(&parameters, &JsValue::from_str("encodings"), &fresh)?;
        fresh
    } else {
        encodings.unchecked_into()
    };
    if encodings.length() == 0 {
        encodings.push(&js_sys::Object::new());
    }
    for encoding in encodings.iter() {
        js_sys::Reflect::set(
            &encoding,
            &JsValue::from_str("maxBitrate"),
            &JsValue::from_f64(f64::from(bitrate_bps)),
        )?;
    }
    JsFuture::from(sender.set_parameters(&parameters)).await?;
    Ok(())
}

// ── Quality monitoring ───────────────────────────────────────────────────────

fn start_quality_monitor(inner: &Rc<RefCell<Inner>>, guard: &mut Inner, peer_id: &str) {
    let Some(entry) = guard.peers.get_mut(peer_id) else {
        return;
    };
    if entry.quality_monitor.is_some() {
        return;
    }
    let interval = {
        let inner = Rc::clone(inner);
        let peer_id = peer_id.to_string();
        Interval::new(QUALITY_TICK_MS, move || {
            let inner = Rc::clone(&inner);
            let peer_id = peer_id.clone();
            spawn_local(async move {
                if let Err(e) = poll_stats(inner, &peer_id).await {
                    debug!("stats poll for {peer_id} failed: {e:?}");
                }
            });
        })
    };
    entry.quality_monitor = Some(interval);
}

async fn poll_stats(inner: Rc<RefCell<Inner>>, peer_id: &str) -> Result<(), JsValue> {
    let Some(pc) = inner.borrow().peers.get(peer_id).map(|e| e.pc.clone()) else {
        return Ok(());
    };
    let report = JsFuture::from(pc.get_stats()).await?;
    let report: js_sys::Map = report.unchecked_into();

    let mut rtt_ms = 0.0f64;
    let mut packets_lost = 0u32;
    let mut jitter_ms = 0.0f64;
    let mut bytes_sent = 0.0f64;
    report.for_each(&mut |value: JsValue, _key: JsValue| {
        let Some(kind) = stat_string(&value, "type") else {
            return;
        };
        match kind.as_str() {
            "remote-inbound-rtp" => {
                rtt_ms = stat_number(&value, "roundTripTime") * 1000.0;
                packets_lost = stat_number(&value, "packetsLost").max(0.0) as u32;
                jitter_ms = stat_number(&value, "jitter") * 1000.0;
            }
            "outbound-rtp" => {
                bytes_sent = stat_number(&value, "bytesSent");
            }
            _ => {}
        }
    });

    let now = js_sys::Date::now();
    let sender_update = {
        let mut guard = inner.borrow_mut();
        let config = guard.quality_config;
        let Some(entry) = guard.peers.get_mut(peer_id) else {
            return Ok(());
        };
        let bitrate_bps = match entry.stats_baseline {
            Some(baseline) if now > baseline.at_ms => {
                ((bytes_sent - baseline.bytes_sent).max(0.0) * 8.0 * 1000.0
                    / (now - baseline.at_ms)) as u32
            }
            _ => 0,
        };
        entry.stats_baseline = Some(StatsBaseline {
            at_ms: now,
            bytes_sent,
        });
        let level = classify(rtt_ms, packets_lost, jitter_ms, &config);
        entry.quality = Some(ConnectionQuality {
            rtt_ms,
            packets_lost,
            jitter_ms,
            bitrate_bps,
            level,
        });
        publish(DiagEvent {
            subsystem: "peer",
            stream_id: Some(peer_id.to_string()),
            severity: match level {
                super::quality::QualityLevel::Poor => Severity::Warning,
                _ => Severity::Debug,
            },
            ts_ms: now_ms(),
            metrics: vec![
                metric!("rtt_ms", rtt_ms),
                metric!("packets_lost", u64::from(packets_lost)),
                metric!("jitter_ms", jitter_ms),
                metric!("bitrate_bps", u64::from(bitrate_bps)),
                metric!("quality", level.to_string()),
            ],
        });
        match adapted_bitrate(level, entry.target_bitrate, &config) {
            Some(reduced) if reduced < entry.target_bitrate => {
                info!(
                    "link to {peer_id} is {level}; lowering outbound bitrate to {reduced}bps"
                );
                entry.target_bitrate = reduced;
                audio_sender(&entry.pc).map(|sender| (sender, reduced))
            }
            _ => None,
        }
    };
    if let Some((sender, bitrate)) = sender_update {
        apply_sender_bitrate(&sender, bitrate).await?;
    }
    Ok(())
}

fn stat_number(value: &JsValue, key: &str) -> f64 {
    js_sys::Reflect::get(value, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
}

fn stat_string(value: &JsValue, key: &str) -> Option<String> {
    js_sys::Reflect::get(value, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_string())
}
