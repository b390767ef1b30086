//! Live voice-activity monitoring over browser audio streams.
//!
//! One shared `AudioContext` hosts a 256-bin analyser per monitored stream.
//! Streams are keyed by `"local"` or the remote peer's socket id; each key
//! gets its own [`ActivityDetector`] so local and remote thresholds differ.
//! Sampling rides the display refresh callback — roughly once per rendered
//! frame, best effort, never blocking.

use super::detector::{mean_magnitude, ActivityDetector, VadConfig};
use gloo::render::{request_animation_frame, AnimationFrame};
use log::{error, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use voicemesh_diagnostics::now_ms;
use voicemesh_types::Callback;
use web_sys::{
    AnalyserNode, AudioContext, MediaStream, MediaStreamAudioSourceNode, MediaStreamTrack,
    MediaStreamTrackState,
};
use wasm_bindgen::JsCast;

/// Payload delivered to activity observers. Observers fire only on
/// speaking-state *transitions*, not every frame.
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceActivityEvent {
    pub user_id: String,
    pub is_active: bool,
    pub volume: f32,
    pub timestamp_ms: u64,
}

struct Monitor {
    analyser: AnalyserNode,
    source: MediaStreamAudioSourceNode,
    detector: ActivityDetector,
    buffer: Vec<u8>,
    // Dropping the handle cancels the pending frame, so removing a monitor
    // stops its loop.
    frame: Option<AnimationFrame>,
}

struct Inner {
    config: VadConfig,
    context: Option<AudioContext>,
    monitors: HashMap<String, Monitor>,
    callbacks: Vec<Callback<VoiceActivityEvent>>,
}

/// Cloneable handle to the analyzer. One instance is constructed at
/// application start and shared by reference; clones share all state.
#[derive(Clone)]
pub struct VoiceActivityAnalyzer {
    inner: Rc<RefCell<Inner>>,
}

impl VoiceActivityAnalyzer {
    pub fn new(config: VadConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                config,
                context: None,
                monitors: HashMap::new(),
                callbacks: Vec::new(),
            })),
        }
    }

    /// Create the shared analysis context. No-op when already created.
    pub fn initialize(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.context.is_some() {
            return;
        }
        match AudioContext::new() {
            Ok(context) => inner.context = Some(context),
            Err(e) => error!("failed to create voice analysis context: {e:?}"),
        }
    }

    /// Begin monitoring a stream under `key`, replacing any previous monitor
    /// for that key. Streams without a live audio track are logged and
    /// skipped.
    pub fn start_monitoring(&self, key: &str, stream: &MediaStream) {
        if !has_live_audio_track(stream) {
            warn!("not monitoring {key}: stream has no live audio track");
            return;
        }
        self.initialize();
        self.stop_monitoring(key);

        {
            let mut inner = self.inner.borrow_mut();
            let Some(context) = inner.context.clone() else {
                return;
            };
            let (source, analyser) = match build_analyser(&context, stream, &inner.config) {
                Ok(nodes) => nodes,
                Err(e) => {
                    error!("failed to attach analyser for {key}: {e:?}");
                    return;
                }
            };
            let buffer = vec![0u8; analyser.frequency_bin_count() as usize];
            let detector = ActivityDetector::for_key(key, &inner.config);
            inner.monitors.insert(
                key.to_string(),
                Monitor {
                    analyser,
                    source,
                    detector,
                    buffer,
                    frame: None,
                },
            );
        }
        schedule_frame(Rc::clone(&self.inner), key.to_string());
    }

    /// Stop monitoring a key. No-op for unknown keys.
    pub fn stop_monitoring(&self, key: &str) {
        if let Some(monitor) = self.inner.borrow_mut().monitors.remove(key) {
            let _ = monitor.source.disconnect();
            let _ = monitor.analyser.disconnect();
            // monitor.frame drops here, cancelling the sampling loop.
        }
    }

    /// Last computed speaking state; `false` for unknown keys.
    pub fn user_activity(&self, key: &str) -> bool {
        self.inner
            .borrow()
            .monitors
            .get(key)
            .is_some_and(|m| m.detector.is_active())
    }

    /// Last computed smoothed volume (0–100); `0` for unknown keys.
    pub fn user_volume(&self, key: &str) -> f32 {
        self.inner
            .borrow()
            .monitors
            .get(key)
            .map_or(0.0, |m| m.detector.volume())
    }

    pub fn add_callback(&self, callback: Callback<VoiceActivityEvent>) {
        self.inner.borrow_mut().callbacks.push(callback);
    }

    pub fn remove_callback(&self, callback: &Callback<VoiceActivityEvent>) {
        self.inner.borrow_mut().callbacks.retain(|cb| cb != callback);
    }

    /// Stop every monitor, drop every observer and release the shared
    /// context.
    pub fn cleanup(&self) {
        let keys: Vec<String> = self.inner.borrow().monitors.keys().cloned().collect();
        for key in keys {
            self.stop_monitoring(&key);
        }
        let mut inner = self.inner.borrow_mut();
        inner.callbacks.clear();
        if let Some(context) = inner.context.take() {
            let _ = context.close();
        }
    }
}

impl Default for VoiceActivityAnalyzer {
    fn default() -> Self {
        Self::new(VadConfig::default())
    }
}

fn has_live_audio_track(stream: &MediaStream) -> bool {
    stream
        .get_audio_tracks()
        .iter()
        .map(|track| track.unchecked_into::<MediaStreamTrack>())
        .any(|track| track.ready_state() == MediaStreamTrackState::Live)
}

fn build_analyser(
    context: &AudioContext,
    stream: &MediaStream,
    config: &VadConfig,
) -> Result<(MediaStreamAudioSourceNode, AnalyserNode), wasm_bindgen::JsValue> {
    let source = context.create_media_stream_source(stream)?;
    let analyser = context.create_analyser()?;
    analyser.set_fft_size(config.fft_size);
    analyser.set_smoothing_time_constant(config.analyser_smoothing);
    source.connect_with_audio_node(&analyser)?;
    Ok((source, analyser))
}

fn schedule_frame(inner: Rc<RefCell<Inner>>, key: String) {
    let handle = request_animation_frame({
        let inner = Rc::clone(&inner);
        let key = key.clone();
        move |_timestamp| {
            let mut transition = None;
            let mut callbacks = Vec::new();
            let keep_going = {
                let mut guard = inner.borrow_mut();
                let Inner {
                    monitors,
                    callbacks: registered,
                    ..
                } = &mut *guard;
                match monitors.get_mut(&key) {
                    Some(monitor) => {
                        monitor.analyser.get_byte_frequency_data(&mut monitor.buffer);
                        let volume = mean_magnitude(&monitor.buffer);
                        if let Some(is_active) = monitor.detector.sample(volume) {
                            transition = Some(VoiceActivityEvent {
                                user_id: key.clone(),
                                is_active,
                                volume: monitor.detector.volume(),
                                timestamp_ms: now_ms(),
                            });
                            callbacks = registered.clone();
                        }
                        true
                    }
                    None => false,
                }
            };
            // Observers run outside the borrow; one observer cannot starve
            // the others or re-enter the analyzer mid-update.
            if let Some(event) = transition {
                for callback in &callbacks {
                    callback.emit(event.clone());
                }
            }
            if keep_going {
                schedule_frame(inner, key);
            }
        }
    });
    if let Some(monitor) = inner.borrow_mut().monitors.get_mut(&key) {
        monitor.frame = Some(handle);
    }
}
