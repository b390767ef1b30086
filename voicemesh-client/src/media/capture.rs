//! The capture/settings collaborator.
//!
//! The voice core treats capture as an external input: it reads the live
//! stream and the quality parameters, reacts to stream replacement through
//! an explicit observer registration, and only ever writes the mute flag
//! onto outbound tracks. [`CaptureController`] is that contract;
//! [`BrowserCapture`] is the default `getUserMedia`-backed implementation.

use crate::sdp::AudioTuning;
use log::{error, info, warn};
use std::cell::RefCell;
use std::rc::Rc;
use voicemesh_types::Callback;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{MediaStream, MediaStreamConstraints, MediaStreamTrack, MediaTrackConstraints};

/// Capture parameters as configured by the user.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct CaptureConfig {
    pub tuning: AudioTuning,
    /// Input device, `None` for the browser default.
    pub device_id: Option<String>,
}

/// Read-only view of the capture subsystem, plus lifecycle calls. The core
/// never mutates capture settings through this trait.
pub trait CaptureController {
    /// The live capture stream, if one has been acquired.
    fn stream(&self) -> Option<MediaStream>;

    /// Current quality parameters (bitrate, sample rate, channels, tier).
    fn tuning(&self) -> AudioTuning;

    fn is_microphone_muted(&self) -> bool;

    /// Begin (or re-run) capture acquisition. Asynchronous; observers
    /// registered via [`on_stream_changed`](Self::on_stream_changed) are
    /// notified when a stream lands. Acquisition failures are logged and
    /// leave the stream absent.
    fn init_media(&self);

    /// Stop all capture tracks and release the stream.
    fn cleanup(&self);

    /// Register an observer for stream replacement (device swap, settings
    /// change, cleanup). Fired with `None` when capture is released.
    fn on_stream_changed(&self, callback: Callback<Option<MediaStream>>);
}

struct Inner {
    config: CaptureConfig,
    stream: Option<MediaStream>,
    muted: bool,
    observers: Vec<Callback<Option<MediaStream>>>,
}

/// `getUserMedia`-backed capture with echo cancellation, noise suppression
/// and automatic gain control enabled.
#[derive(Clone)]
pub struct BrowserCapture {
    inner: Rc<RefCell<Inner>>,
}

impl BrowserCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                config,
                stream: None,
                muted: false,
                observers: Vec::new(),
            })),
        }
    }

    /// Mute or unmute the microphone by toggling track `enabled` flags; the
    /// stream keeps flowing so negotiation state is untouched.
    pub fn set_muted(&self, muted: bool) {
        let stream = {
            let mut inner = self.inner.borrow_mut();
            inner.muted = muted;
            inner.stream.clone()
        };
        if let Some(stream) = stream {
            set_tracks_enabled(&stream, !muted);
        }
    }

    /// Switch input device; re-acquires the stream when one is live.
    pub fn select_device(&self, device_id: Option<String>) {
        let need_reacquire = {
            let mut inner = self.inner.borrow_mut();
            inner.config.device_id = device_id;
            inner.stream.is_some()
        };
        if need_reacquire {
            self.init_media();
        }
    }

    /// Update quality parameters; peers pick the change up on the next
    /// negotiation or track replacement.
    pub fn set_tuning(&self, tuning: AudioTuning) {
        self.inner.borrow_mut().config.tuning = tuning;
    }

    async fn acquire(inner: Rc<RefCell<Inner>>) -> Result<(), JsValue> {
        let constraints = {
            let inner = inner.borrow();
            audio_constraints(&inner.config)
        };
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let devices = window.navigator().media_devices()?;
        let promise = devices.get_user_media_with_constraints(&constraints)?;
        let stream: MediaStream = JsFuture::from(promise).await?.unchecked_into();
        info!("acquired capture stream with {} audio track(s)", stream.get_audio_tracks().length());

        let observers = {
            let mut guard = inner.borrow_mut();
            if let Some(old) = guard.stream.take() {
                stop_tracks(&old);
            }
            set_tracks_enabled(&stream, !guard.muted);
            guard.stream = Some(stream.clone());
            guard.observers.clone()
        };
        for observer in &observers {
            observer.emit(Some(stream.clone()));
        }
        Ok(())
    }
}

impl CaptureController for BrowserCapture {
    fn stream(&self) -> Option<MediaStream> {
        self.inner.borrow().stream.clone()
    }

    fn tuning(&self) -> AudioTuning {
        self.inner.borrow().config.tuning
    }

    fn is_microphone_muted(&self) -> bool {
        self.inner.borrow().muted
    }

    fn init_media(&self) {
        let inner = Rc::clone(&self.inner);
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = Self::acquire(inner).await {
                error!("media acquisition failed: {e:?}");
            }
        });
    }

    fn cleanup(&self) {
        let observers = {
            let mut inner = self.inner.borrow_mut();
            match inner.stream.take() {
                Some(stream) => {
                    stop_tracks(&stream);
                    inner.observers.clone()
                }
                None => {
                    warn!("capture cleanup with no active stream");
                    Vec::new()
                }
            }
        };
        for observer in &observers {
            observer.emit(None);
        }
    }

    fn on_stream_changed(&self, callback: Callback<Option<MediaStream>>) {
        self.inner.borrow_mut().observers.push(callback);
    }
}

fn audio_constraints(config: &CaptureConfig) -> MediaStreamConstraints {
    let audio = MediaTrackConstraints::new();
    audio.set_echo_cancellation(&JsValue::TRUE);
    audio.set_noise_suppression(&JsValue::TRUE);
    audio.set_auto_gain_control(&JsValue::TRUE);
    audio.set_sample_rate(&JsValue::from_f64(f64::from(config.tuning.sample_rate)));
    audio.set_channel_count(&JsValue::from_f64(f64::from(config.tuning.channel_count)));
    if let Some(device_id) = &config.device_id {
        audio.set_device_id(&JsValue::from_str(device_id));
    }
    let constraints = MediaStreamConstraints::new();
    constraints.set_audio(&audio.into());
    constraints.set_video(&JsValue::FALSE);
    constraints
}

fn set_tracks_enabled(stream: &MediaStream, enabled: bool) {
    for track in stream.get_audio_tracks().iter() {
        track.unchecked_into::<MediaStreamTrack>().set_enabled(enabled);
    }
}

pub(crate) fn stop_tracks(stream: &MediaStream) {
    for track in stream.get_tracks().iter() {
        track.unchecked_into::<MediaStreamTrack>().stop();
    }
}
