//! Opus quality tuning applied to every description before it is set.
//!
//! A mesh call has no media server to renegotiate bitrate for us, so both
//! locally-generated and remotely-received descriptions pass through this
//! rewrite. Peers may run asymmetric quality settings; applying the rewrite
//! symmetrically keeps each direction within the local tier's ceiling.

use super::{SdpError, SessionDescription};
use crate::constants::{
    DEFAULT_AUDIO_BITRATE, DEFAULT_CHANNEL_COUNT, DEFAULT_SAMPLE_RATE, OPUS_MAX_PLAYBACK_RATE,
    OPUS_MIN_PLAYBACK_RATE, OPUS_MIN_PTIME_MS,
};
use std::collections::BTreeMap;
use voicemesh_types::AudioQuality;

/// Audio parameters the capture settings expose, condensed to what the SDP
/// rewrite needs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioTuning {
    /// Configured bitrate in bits/s, before the tier ceiling is applied.
    pub bitrate: u32,
    pub sample_rate: u32,
    pub channel_count: u8,
    pub quality: AudioQuality,
}

impl Default for AudioTuning {
    fn default() -> Self {
        Self {
            bitrate: DEFAULT_AUDIO_BITRATE,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channel_count: DEFAULT_CHANNEL_COUNT,
            quality: AudioQuality::default(),
        }
    }
}

/// Effective outbound bitrate in bits/s after the tier ceiling.
pub fn target_bitrate(tuning: &AudioTuning) -> u32 {
    tuning.quality.clamp_bitrate(tuning.bitrate)
}

/// Rewrite every audio section of `sdp` for voice quality:
///
/// * Opus becomes the preferred codec.
/// * The Opus `fmtp` parameters are set from the tuning: packet time floor,
///   inband FEC on, DTX off (continuous encoding reads better than
///   power-saving silence suppression mid-call), variable bitrate, stereo
///   from the channel count unless the tier forces mono, playback rate and
///   average bitrate clamped to the tier.
/// * Feedback mechanisms for adaptive bitrate and loss recovery
///   (goog-remb, transport-cc, nack, nack pli) and the audio-level header
///   extension are present.
///
/// Sections without an Opus mapping are left untouched. The rewrite is
/// idempotent: re-running it over its own output changes nothing.
pub fn apply_audio_tuning(sdp: &str, tuning: &AudioTuning) -> Result<String, SdpError> {
    let mut session = SessionDescription::parse(sdp)?;
    for audio in session.audio_sections_mut() {
        let payload_types = audio.payload_types_for("opus");
        let Some(pt) = payload_types.first().cloned() else {
            continue;
        };
        audio.promote_format(&pt);

        let mut params = audio.fmtp_params(&pt).unwrap_or_default();
        let stereo = tuning.channel_count >= 2 && !tuning.quality.forces_mono();
        let playback_rate = tuning
            .sample_rate
            .clamp(OPUS_MIN_PLAYBACK_RATE, OPUS_MAX_PLAYBACK_RATE);
        set(&mut params, "minptime", OPUS_MIN_PTIME_MS);
        set(&mut params, "useinbandfec", 1);
        set(&mut params, "usedtx", 0);
        set(&mut params, "cbr", 0);
        set(&mut params, "stereo", u32::from(stereo));
        set(&mut params, "maxplaybackrate", playback_rate);
        set(&mut params, "maxaveragebitrate", target_bitrate(tuning));
        params.insert("application".into(), "voip".into());
        audio.set_fmtp(&pt, &params);

        for feedback in ["goog-remb", "transport-cc", "nack", "nack pli"] {
            audio.ensure_rtcp_fb(&pt, feedback);
        }
        audio.ensure_extmap("urn:ietf:params:rtp-hdrext:ssrc-audio-level");
    }
    Ok(session.serialize())
}

fn set(params: &mut BTreeMap<String, String>, key: &str, value: u32) {
    params.insert(key.to_string(), value.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFER: &str = "v=0\r\n\
        o=- 46117317 2 IN IP4 127.0.0.1\r\n\
        s=-\r\n\
        t=0 0\r\n\
        m=audio 9 UDP/TLS/RTP/SAVPF 103 111 0\r\n\
        c=IN IP4 0.0.0.0\r\n\
        a=mid:0\r\n\
        a=rtpmap:103 ISAC/16000\r\n\
        a=rtpmap:111 opus/48000/2\r\n\
        a=fmtp:111 minptime=10;useinbandfec=1;sprop-stereo=1\r\n\
        a=rtpmap:0 PCMU/8000\r\n";

    fn tuning(quality: AudioQuality, bitrate: u32) -> AudioTuning {
        AudioTuning {
            bitrate,
            sample_rate: 48_000,
            channel_count: 2,
            quality,
        }
    }

    fn fmtp_line(sdp: &str) -> &str {
        sdp.lines().find(|l| l.starts_with("a=fmtp:111")).unwrap()
    }

    #[test]
    fn rewrite_is_idempotent() {
        let tuning = tuning(AudioQuality::High, 500_000);
        let once = apply_audio_tuning(OFFER, &tuning).unwrap();
        let twice = apply_audio_tuning(&once, &tuning).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn opus_becomes_preferred_codec() {
        let rewritten = apply_audio_tuning(OFFER, &tuning(AudioQuality::Medium, 96_000)).unwrap();
        assert!(rewritten.contains("m=audio 9 UDP/TLS/RTP/SAVPF 111 103 0"));
    }

    #[test]
    fn tier_ceilings_cap_configured_bitrate() {
        for (quality, ceiling) in [
            (AudioQuality::Low, 96_000u32),
            (AudioQuality::Medium, 192_000),
            (AudioQuality::High, 320_000),
            (AudioQuality::Ultra, 512_000),
        ] {
            let rewritten = apply_audio_tuning(OFFER, &tuning(quality, 900_000)).unwrap();
            let line = fmtp_line(&rewritten);
            let value: u32 = line
                .split(';')
                .find_map(|p| p.strip_prefix("maxaveragebitrate="))
                .unwrap()
                .parse()
                .unwrap();
            assert!(value <= ceiling, "{quality:?}: {value} > {ceiling}");
        }
    }

    #[test]
    fn low_tier_forces_mono_and_96k() {
        let rewritten = apply_audio_tuning(OFFER, &tuning(AudioQuality::Low, 500_000)).unwrap();
        let line = fmtp_line(&rewritten);
        assert!(line.contains("stereo=0"));
        assert!(line.contains("maxaveragebitrate=96000"));
    }

    #[test]
    fn high_tier_keeps_stereo_from_channel_count() {
        let rewritten = apply_audio_tuning(OFFER, &tuning(AudioQuality::High, 256_000)).unwrap();
        assert!(fmtp_line(&rewritten).contains("stereo=1"));

        let mono = AudioTuning {
            channel_count: 1,
            ..tuning(AudioQuality::High, 256_000)
        };
        let rewritten = apply_audio_tuning(OFFER, &mono).unwrap();
        assert!(fmtp_line(&rewritten).contains("stereo=0"));
    }

    #[test]
    fn existing_foreign_fmtp_params_survive() {
        let rewritten = apply_audio_tuning(OFFER, &tuning(AudioQuality::Ultra, 500_000)).unwrap();
        assert!(fmtp_line(&rewritten).contains("sprop-stereo=1"));
    }

    #[test]
    fn dtx_disabled_and_vbr_kept() {
        let rewritten = apply_audio_tuning(OFFER, &tuning(AudioQuality::Medium, 128_000)).unwrap();
        let line = fmtp_line(&rewritten);
        assert!(line.contains("usedtx=0"));
        assert!(line.contains("cbr=0"));
        assert!(line.contains("application=voip"));
    }

    #[test]
    fn feedback_and_audio_level_extension_present() {
        let rewritten = apply_audio_tuning(OFFER, &tuning(AudioQuality::Medium, 128_000)).unwrap();
        for needle in [
            "a=rtcp-fb:111 goog-remb",
            "a=rtcp-fb:111 transport-cc",
            "a=rtcp-fb:111 nack",
            "a=rtcp-fb:111 nack pli",
            "urn:ietf:params:rtp-hdrext:ssrc-audio-level",
        ] {
            assert!(rewritten.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn playback_rate_clamps_to_opus_range() {
        let odd = AudioTuning {
            sample_rate: 96_000,
            ..tuning(AudioQuality::Ultra, 500_000)
        };
        let rewritten = apply_audio_tuning(OFFER, &odd).unwrap();
        assert!(fmtp_line(&rewritten).contains("maxplaybackrate=48000"));
    }

    #[test]
    fn session_without_opus_is_unchanged() {
        let sdp = "v=0\r\ns=-\r\nm=audio 9 RTP/AVP 0\r\na=rtpmap:0 PCMU/8000\r\n";
        assert_eq!(
            apply_audio_tuning(sdp, &tuning(AudioQuality::Low, 96_000)).unwrap(),
            sdp
        );
    }
}
