//! Connection-quality classification and the adaptive-bitrate policy.
//!
//! A mesh has no server-side congestion control to lean on, so every client
//! watches its own transport statistics and unilaterally lowers its outbound
//! bitrate when a link degrades. No renegotiation with the peer is involved.

use crate::constants::{FAIR_BITRATE_FLOOR, POOR_BITRATE_FLOOR};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualityLevel::Excellent => "excellent",
            QualityLevel::Good => "good",
            QualityLevel::Fair => "fair",
            QualityLevel::Poor => "poor",
        };
        write!(f, "{name}")
    }
}

/// Cutoffs above which a link falls into a band. A link is `Poor` when any
/// dimension exceeds the poor cutoffs, else `Fair`, else `Good`, else
/// `Excellent`. Empirically chosen defaults; tunable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityConfig {
    pub poor: Cutoffs,
    pub fair: Cutoffs,
    pub good: Cutoffs,
    pub poor_bitrate_floor: u32,
    pub fair_bitrate_floor: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cutoffs {
    pub rtt_ms: f64,
    pub packets_lost: u32,
    pub jitter_ms: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            poor: Cutoffs {
                rtt_ms: 200.0,
                packets_lost: 10,
                jitter_ms: 50.0,
            },
            fair: Cutoffs {
                rtt_ms: 100.0,
                packets_lost: 5,
                jitter_ms: 30.0,
            },
            good: Cutoffs {
                rtt_ms: 50.0,
                packets_lost: 2,
                jitter_ms: 15.0,
            },
            poor_bitrate_floor: POOR_BITRATE_FLOOR,
            fair_bitrate_floor: FAIR_BITRATE_FLOOR,
        }
    }
}

impl Cutoffs {
    fn exceeded_by(&self, rtt_ms: f64, packets_lost: u32, jitter_ms: f64) -> bool {
        rtt_ms > self.rtt_ms || packets_lost > self.packets_lost || jitter_ms > self.jitter_ms
    }
}

/// One monitoring-tick snapshot for a peer. Recomputed every tick, never
/// persisted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConnectionQuality {
    pub rtt_ms: f64,
    pub packets_lost: u32,
    pub jitter_ms: f64,
    /// Measured outbound bitrate in bits/s.
    pub bitrate_bps: u32,
    pub level: QualityLevel,
}

pub fn classify(rtt_ms: f64, packets_lost: u32, jitter_ms: f64, config: &QualityConfig) -> QualityLevel {
    if config.poor.exceeded_by(rtt_ms, packets_lost, jitter_ms) {
        QualityLevel::Poor
    } else if config.fair.exceeded_by(rtt_ms, packets_lost, jitter_ms) {
        QualityLevel::Fair
    } else if config.good.exceeded_by(rtt_ms, packets_lost, jitter_ms) {
        QualityLevel::Good
    } else {
        QualityLevel::Excellent
    }
}

/// Bitrate reduction for a degraded link: halve on `Poor`, take a quarter
/// off on `Fair`, each with its own hard floor. `None` means leave the
/// sender alone.
pub fn adapted_bitrate(level: QualityLevel, current_bps: u32, config: &QualityConfig) -> Option<u32> {
    match level {
        QualityLevel::Poor => Some((current_bps / 2).max(config.poor_bitrate_floor)),
        QualityLevel::Fair => Some((current_bps * 3 / 4).max(config.fair_bitrate_floor)),
        QualityLevel::Good | QualityLevel::Excellent => None,
    }
}
