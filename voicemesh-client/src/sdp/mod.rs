//! Structured SDP handling.
//!
//! Session descriptions are parsed into a line-preserving structure, mutated
//! through named operations, and serialized back. Rewrites therefore cannot
//! clobber each other the way overlapping textual substitutions can, and
//! applying the same rewrite twice yields the same text as applying it once.
//!
//! The parser is deliberately tolerant: it understands the `m=` section
//! structure and the handful of attributes the tuning pass needs
//! (`rtpmap`, `fmtp`, `rtcp-fb`, `extmap`) and carries every other line
//! through verbatim.

mod tuning;

pub use tuning::{apply_audio_tuning, target_bitrate, AudioTuning};

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SdpError {
    #[error("empty session description")]
    Empty,
    #[error("malformed media line: {0}")]
    InvalidMediaLine(String),
}

/// A parsed session description: the session-level lines followed by one
/// entry per `m=` section.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionDescription {
    session_lines: Vec<String>,
    media: Vec<MediaSection>,
}

/// One `m=` section: the parsed header plus its attribute/value lines.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaSection {
    media_type: String,
    port: String,
    protocol: String,
    formats: Vec<String>,
    lines: Vec<String>,
}

impl SessionDescription {
    pub fn parse(text: &str) -> Result<Self, SdpError> {
        if text.trim().is_empty() {
            return Err(SdpError::Empty);
        }
        let mut session_lines = Vec::new();
        let mut media: Vec<MediaSection> = Vec::new();
        for raw in text.lines() {
            let line = raw.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            if let Some(value) = line.strip_prefix("m=") {
                media.push(MediaSection::parse_header(value)?);
            } else if let Some(section) = media.last_mut() {
                section.lines.push(line.to_string());
            } else {
                session_lines.push(line.to_string());
            }
        }
        Ok(Self {
            session_lines,
            media,
        })
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for line in &self.session_lines {
            out.push_str(line);
            out.push_str("\r\n");
        }
        for section in &self.media {
            out.push_str(&section.header_line());
            out.push_str("\r\n");
            for line in &section.lines {
                out.push_str(line);
                out.push_str("\r\n");
            }
        }
        out
    }

    pub fn media_sections(&self) -> &[MediaSection] {
        &self.media
    }

    pub fn audio_sections_mut(&mut self) -> impl Iterator<Item = &mut MediaSection> + '_ {
        self.media.iter_mut().filter(|m| m.is_audio())
    }
}

impl MediaSection {
    fn parse_header(value: &str) -> Result<Self, SdpError> {
        let parts: Vec<&str> = value.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(SdpError::InvalidMediaLine(value.to_string()));
        }
        Ok(Self {
            media_type: parts[0].to_string(),
            port: parts[1].to_string(),
            protocol: parts[2].to_string(),
            formats: parts[3..].iter().map(|s| s.to_string()).collect(),
            lines: Vec::new(),
        })
    }

    fn header_line(&self) -> String {
        format!(
            "m={} {} {} {}",
            self.media_type,
            self.port,
            self.protocol,
            self.formats.join(" ")
        )
    }

    pub fn is_audio(&self) -> bool {
        self.media_type == "audio"
    }

    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    /// Payload types mapped to the given codec name, in declaration order.
    pub fn payload_types_for(&self, codec: &str) -> Vec<String> {
        let mut found = Vec::new();
        for line in &self.lines {
            if let Some(value) = line.strip_prefix("a=rtpmap:") {
                if let Some((pt, encoding)) = value.split_once(' ') {
                    let name = encoding.split('/').next().unwrap_or("");
                    if name.eq_ignore_ascii_case(codec) {
                        found.push(pt.to_string());
                    }
                }
            }
        }
        found
    }

    /// Move a payload type to the front of the format list, making it the
    /// preferred codec. No-op when it is already first or not listed.
    pub fn promote_format(&mut self, pt: &str) {
        if let Some(pos) = self.formats.iter().position(|f| f == pt) {
            if pos > 0 {
                let fmt = self.formats.remove(pos);
                self.formats.insert(0, fmt);
            }
        }
    }

    /// Parsed parameters of the `fmtp` line for a payload type, if present.
    pub fn fmtp_params(&self, pt: &str) -> Option<BTreeMap<String, String>> {
        let prefix = format!("a=fmtp:{pt} ");
        let line = self.lines.iter().find(|l| l.starts_with(&prefix))?;
        let mut params = BTreeMap::new();
        for item in line[prefix.len()..].split(';') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            match item.split_once('=') {
                Some((k, v)) => params.insert(k.to_string(), v.to_string()),
                None => params.insert(item.to_string(), String::new()),
            };
        }
        Some(params)
    }

    /// Replace (or insert, after the payload type's `rtpmap` line) the
    /// `fmtp` line for a payload type. Parameters serialize in key order,
    /// which keeps the rewrite deterministic.
    pub fn set_fmtp(&mut self, pt: &str, params: &BTreeMap<String, String>) {
        let rendered = params
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{k}={v}")
                }
            })
            .collect::<Vec<_>>()
            .join(";");
        let line = format!("a=fmtp:{pt} {rendered}");
        let prefix = format!("a=fmtp:{pt} ");
        if let Some(pos) = self.lines.iter().position(|l| l.starts_with(&prefix)) {
            self.lines[pos] = line;
            return;
        }
        let rtpmap_prefix = format!("a=rtpmap:{pt} ");
        match self.lines.iter().position(|l| l.starts_with(&rtpmap_prefix)) {
            Some(pos) => self.lines.insert(pos + 1, line),
            None => self.lines.push(line),
        }
    }

    /// Ensure an `a=rtcp-fb:<pt> <value>` line exists for the payload type.
    pub fn ensure_rtcp_fb(&mut self, pt: &str, value: &str) {
        let line = format!("a=rtcp-fb:{pt} {value}");
        if !self.lines.iter().any(|l| l == &line) {
            self.lines.push(line);
        }
    }

    /// Ensure an `a=extmap` line for the given extension URI exists,
    /// allocating the next free id when it has to be added.
    pub fn ensure_extmap(&mut self, uri: &str) {
        let present = self.lines.iter().any(|l| {
            l.strip_prefix("a=extmap:")
                .and_then(|v| v.split_once(' '))
                .is_some_and(|(_, u)| u == uri)
        });
        if present {
            return;
        }
        let next_id = self
            .lines
            .iter()
            .filter_map(|l| l.strip_prefix("a=extmap:"))
            .filter_map(|v| v.split_once(' '))
            .filter_map(|(id, _)| id.split('/').next().unwrap_or(id).parse::<u32>().ok())
            .max()
            .map_or(1, |max| max + 1);
        self.lines.push(format!("a=extmap:{next_id} {uri}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFER: &str = "v=0\r\n\
        o=- 46117317 2 IN IP4 127.0.0.1\r\n\
        s=-\r\n\
        t=0 0\r\n\
        a=group:BUNDLE 0\r\n\
        m=audio 9 UDP/TLS/RTP/SAVPF 103 111 9 0 8\r\n\
        c=IN IP4 0.0.0.0\r\n\
        a=mid:0\r\n\
        a=extmap:1 urn:ietf:params:rtp-hdrext:sdes:mid\r\n\
        a=rtpmap:103 ISAC/16000\r\n\
        a=rtpmap:111 opus/48000/2\r\n\
        a=fmtp:111 minptime=10;useinbandfec=1\r\n\
        a=rtpmap:9 G722/8000\r\n\
        a=rtpmap:0 PCMU/8000\r\n\
        a=rtpmap:8 PCMA/8000\r\n";

    #[test]
    fn parse_serialize_round_trip_preserves_lines() {
        let session = SessionDescription::parse(OFFER).unwrap();
        assert_eq!(session.serialize(), OFFER);
    }

    #[test]
    fn finds_opus_payload_type() {
        let session = SessionDescription::parse(OFFER).unwrap();
        let audio = &session.media_sections()[0];
        assert_eq!(audio.payload_types_for("opus"), vec!["111".to_string()]);
        assert_eq!(audio.payload_types_for("OPUS"), vec!["111".to_string()]);
    }

    #[test]
    fn promote_format_moves_to_front_once() {
        let mut session = SessionDescription::parse(OFFER).unwrap();
        let audio = session.audio_sections_mut().next().unwrap();
        audio.promote_format("111");
        assert_eq!(audio.formats()[0], "111");
        let snapshot = audio.formats().to_vec();
        audio.promote_format("111");
        assert_eq!(audio.formats(), &snapshot[..]);
    }

    #[test]
    fn set_fmtp_replaces_existing_line() {
        let mut session = SessionDescription::parse(OFFER).unwrap();
        let audio = session.audio_sections_mut().next().unwrap();
        let mut params = audio.fmtp_params("111").unwrap();
        params.insert("stereo".into(), "0".into());
        audio.set_fmtp("111", &params);
        let text = session.serialize();
        assert_eq!(text.matches("a=fmtp:111").count(), 1);
        assert!(text.contains("stereo=0"));
        assert!(text.contains("useinbandfec=1"));
    }

    #[test]
    fn set_fmtp_inserts_after_rtpmap_when_missing() {
        let mut session = SessionDescription::parse(OFFER).unwrap();
        let audio = session.audio_sections_mut().next().unwrap();
        let mut params = BTreeMap::new();
        params.insert("mode".into(), "30".into());
        audio.set_fmtp("103", &params);
        let text = session.serialize();
        let rtpmap_at = text.find("a=rtpmap:103").unwrap();
        let fmtp_at = text.find("a=fmtp:103 mode=30").unwrap();
        assert!(fmtp_at > rtpmap_at);
        assert!(fmtp_at < text.find("a=rtpmap:111").unwrap());
    }

    #[test]
    fn ensure_rtcp_fb_does_not_duplicate() {
        let mut session = SessionDescription::parse(OFFER).unwrap();
        let audio = session.audio_sections_mut().next().unwrap();
        audio.ensure_rtcp_fb("111", "transport-cc");
        audio.ensure_rtcp_fb("111", "transport-cc");
        assert_eq!(
            session.serialize().matches("a=rtcp-fb:111 transport-cc").count(),
            1
        );
    }

    #[test]
    fn ensure_extmap_allocates_free_id() {
        let mut session = SessionDescription::parse(OFFER).unwrap();
        let audio = session.audio_sections_mut().next().unwrap();
        audio.ensure_extmap("urn:ietf:params:rtp-hdrext:ssrc-audio-level");
        let text = session.serialize();
        assert!(text.contains("a=extmap:2 urn:ietf:params:rtp-hdrext:ssrc-audio-level"));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(SessionDescription::parse("  \n"), Err(SdpError::Empty));
    }

    #[test]
    fn malformed_media_line_is_an_error() {
        assert!(matches!(
            SessionDescription::parse("v=0\r\nm=audio 9\r\n"),
            Err(SdpError::InvalidMediaLine(_))
        ));
    }
}
