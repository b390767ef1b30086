//! Discrete audio-quality tiers.

use serde::{Deserialize, Serialize};

/// Audio-quality preset selected in the capture settings.
///
/// Each tier puts a hard ceiling on the Opus bitrate negotiated with every
/// peer; the two lower tiers additionally force mono to save bandwidth.
/// Peers may run asymmetric tiers, which is why the ceiling is applied to
/// both locally-generated and remotely-received descriptions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

impl AudioQuality {
    /// Ceiling for the Opus `maxaveragebitrate` parameter, in bits/s.
    pub fn max_bitrate(self) -> u32 {
        match self {
            AudioQuality::Low => 96_000,
            AudioQuality::Medium => 192_000,
            AudioQuality::High => 320_000,
            AudioQuality::Ultra => 512_000,
        }
    }

    /// Whether this tier drops the stream to a single channel regardless of
    /// the configured channel count.
    pub fn forces_mono(self) -> bool {
        matches!(self, AudioQuality::Low | AudioQuality::Medium)
    }

    /// Clamp a configured bitrate (bits/s) to this tier's ceiling.
    pub fn clamp_bitrate(self, configured: u32) -> u32 {
        configured.min(self.max_bitrate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceilings_are_monotonic() {
        let tiers = [
            AudioQuality::Low,
            AudioQuality::Medium,
            AudioQuality::High,
            AudioQuality::Ultra,
        ];
        for pair in tiers.windows(2) {
            assert!(pair[0].max_bitrate() < pair[1].max_bitrate());
        }
    }

    #[test]
    fn clamp_never_exceeds_ceiling() {
        assert_eq!(AudioQuality::Low.clamp_bitrate(500_000), 96_000);
        assert_eq!(AudioQuality::Ultra.clamp_bitrate(500_000), 500_000);
        assert_eq!(AudioQuality::Medium.clamp_bitrate(64_000), 64_000);
    }

    #[test]
    fn only_lower_tiers_force_mono() {
        assert!(AudioQuality::Low.forces_mono());
        assert!(AudioQuality::Medium.forces_mono());
        assert!(!AudioQuality::High.forces_mono());
        assert!(!AudioQuality::Ultra.forces_mono());
    }
}
