//! The quality rewrite must hold for both directions of a negotiation,
//! including when the two sides run different tiers.

use crate::sdp::{apply_audio_tuning, AudioTuning};
use voicemesh_types::AudioQuality;

const REMOTE_OFFER: &str = "v=0\r\n\
    o=- 7151651 2 IN IP4 127.0.0.1\r\n\
    s=-\r\n\
    t=0 0\r\n\
    m=audio 9 UDP/TLS/RTP/SAVPF 111 103\r\n\
    c=IN IP4 0.0.0.0\r\n\
    a=mid:0\r\n\
    a=rtpmap:111 opus/48000/2\r\n\
    a=fmtp:111 minptime=20;useinbandfec=0;stereo=1;maxaveragebitrate=510000\r\n\
    a=rtpmap:103 ISAC/16000\r\n";

fn bitrate_in(sdp: &str) -> u32 {
    sdp.lines()
        .find(|l| l.starts_with("a=fmtp:111"))
        .and_then(|l| {
            l.split(';')
                .find_map(|p| p.strip_prefix("maxaveragebitrate="))
        })
        .and_then(|v| v.parse().ok())
        .unwrap()
}

#[test]
fn received_offer_is_clamped_to_local_tier() {
    // The remote side negotiated for 510 kbps stereo; our low tier caps the
    // description before it is applied.
    let local = AudioTuning {
        bitrate: 500_000,
        sample_rate: 48_000,
        channel_count: 2,
        quality: AudioQuality::Low,
    };
    let rewritten = apply_audio_tuning(REMOTE_OFFER, &local).unwrap();
    assert!(bitrate_in(&rewritten) <= 96_000);
    assert!(rewritten.contains("stereo=0"));
    assert!(rewritten.contains("useinbandfec=1"));
}

#[test]
fn rewrite_of_rewritten_remote_sdp_is_stable() {
    let local = AudioTuning {
        bitrate: 256_000,
        sample_rate: 48_000,
        channel_count: 2,
        quality: AudioQuality::High,
    };
    let once = apply_audio_tuning(REMOTE_OFFER, &local).unwrap();
    let twice = apply_audio_tuning(&once, &local).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn asymmetric_tiers_each_respect_their_own_ceiling() {
    for (tier, ceiling) in [
        (AudioQuality::Low, 96_000),
        (AudioQuality::Ultra, 512_000),
    ] {
        let tuning = AudioTuning {
            bitrate: 1_000_000,
            sample_rate: 48_000,
            channel_count: 2,
            quality: tier,
        };
        let rewritten = apply_audio_tuning(REMOTE_OFFER, &tuning).unwrap();
        assert!(bitrate_in(&rewritten) <= ceiling);
    }
}
