//! Amplitude-based speech detection, independent of any audio API.
//!
//! The analyser half of the pipeline (FFT over a live stream) is browser
//! territory; everything after the raw bin magnitudes — smoothing,
//! thresholding, edge detection — lives here so it can be exercised with
//! synthetic samples.

use crate::constants::{
    VAD_ANALYSER_SMOOTHING, VAD_FFT_SIZE, VAD_LOCAL_THRESHOLD, VAD_REMOTE_THRESHOLD,
    VAD_VOLUME_ALPHA,
};
use voicemesh_types::LOCAL_STREAM_KEY;

/// Tunables for voice-activity detection. The defaults are empirically
/// chosen, not derived; hosts are free to override them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VadConfig {
    /// FFT size for the per-stream analyser node.
    pub fft_size: u32,
    /// Smoothing constant applied by the analyser itself.
    pub analyser_smoothing: f64,
    /// Exponential smoothing factor for the volume estimate:
    /// `smoothed = prev * alpha + current * (1 - alpha)`.
    pub alpha: f32,
    /// Speaking threshold for the local capture stream. Higher than the
    /// remote threshold to reject the hotter local signal floor.
    pub local_threshold: f32,
    /// Speaking threshold for decoded remote streams.
    pub remote_threshold: f32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            fft_size: VAD_FFT_SIZE,
            analyser_smoothing: VAD_ANALYSER_SMOOTHING,
            alpha: VAD_VOLUME_ALPHA,
            local_threshold: VAD_LOCAL_THRESHOLD,
            remote_threshold: VAD_REMOTE_THRESHOLD,
        }
    }
}

impl VadConfig {
    pub fn threshold_for(&self, key: &str) -> f32 {
        if key == LOCAL_STREAM_KEY {
            self.local_threshold
        } else {
            self.remote_threshold
        }
    }
}

/// Mean FFT-bin magnitude scaled from the analyser's 0–255 range to 0–100.
pub fn mean_magnitude(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u32 = bins.iter().map(|&b| u32::from(b)).sum();
    (sum as f32 / bins.len() as f32) * (100.0 / 255.0)
}

/// Per-stream speaking state: exponentially smoothed volume compared
/// against a fixed threshold, reporting only threshold *crossings*.
#[derive(Clone, Debug)]
pub struct ActivityDetector {
    threshold: f32,
    alpha: f32,
    smoothed: f32,
    active: bool,
}

impl ActivityDetector {
    pub fn new(threshold: f32, alpha: f32) -> Self {
        Self {
            threshold,
            alpha,
            smoothed: 0.0,
            active: false,
        }
    }

    pub fn for_key(key: &str, config: &VadConfig) -> Self {
        Self::new(config.threshold_for(key), config.alpha)
    }

    /// Feed one volume sample (0–100). Returns `Some(new_state)` when the
    /// activity state flips, `None` otherwise.
    pub fn sample(&mut self, volume: f32) -> Option<bool> {
        self.smoothed = self.smoothed * self.alpha + volume * (1.0 - self.alpha);
        let next = self.smoothed > self.threshold;
        if next != self.active {
            self.active = next;
            Some(next)
        } else {
            None
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn volume(&self) -> f32 {
        self.smoothed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothing_follows_exponential_formula() {
        let mut detector = ActivityDetector::new(50.0, 0.8);
        detector.sample(10.0);
        assert!((detector.volume() - 2.0).abs() < 1e-5);
        detector.sample(10.0);
        assert!((detector.volume() - 3.6).abs() < 1e-5);
    }

    #[test]
    fn sustained_activity_fires_one_rising_edge() {
        let mut detector = ActivityDetector::new(8.0, 0.8);
        let mut transitions = 0;
        for _ in 0..10 {
            if let Some(active) = detector.sample(60.0) {
                assert!(active);
                transitions += 1;
            }
        }
        assert_eq!(transitions, 1);
        assert!(detector.is_active());
    }

    #[test]
    fn falling_edge_fires_once() {
        let mut detector = ActivityDetector::new(8.0, 0.8);
        for _ in 0..10 {
            detector.sample(60.0);
        }
        let mut transitions = Vec::new();
        for _ in 0..30 {
            if let Some(active) = detector.sample(0.0) {
                transitions.push(active);
            }
        }
        assert_eq!(transitions, vec![false]);
    }

    #[test]
    fn local_threshold_sits_above_remote() {
        let config = VadConfig::default();
        assert!(config.local_threshold > config.remote_threshold);
    }

    #[test]
    fn amplitude_between_thresholds_splits_local_and_remote() {
        let config = VadConfig::default();
        let between = (config.local_threshold + config.remote_threshold) / 2.0;
        let mut local = ActivityDetector::for_key("local", &config);
        let mut remote = ActivityDetector::for_key("p1", &config);
        for _ in 0..50 {
            local.sample(between);
            remote.sample(between);
        }
        assert!(!local.is_active());
        assert!(remote.is_active());
    }

    #[test]
    fn mean_magnitude_scales_to_percent() {
        assert_eq!(mean_magnitude(&[]), 0.0);
        assert!((mean_magnitude(&[255; 128]) - 100.0).abs() < 1e-4);
        assert!((mean_magnitude(&[0, 255]) - 50.0).abs() < 1e-4);
    }
}
