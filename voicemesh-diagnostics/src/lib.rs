/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! Lightweight diagnostics event bus shared across the code-base.
//!
//! Voice-core subsystems publish structured events (peer quality snapshots,
//! reconnect attempts, monitor lifecycle) here instead of relying on console
//! output, so tests and host applications can subscribe and assert on them.
//! Works on both native and `wasm32` targets.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

// === Diagnostic data structures ===

/// How noteworthy an event is. `Warning` and `Error` events describe
/// conditions the host application may want to surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiagEvent {
    /// Sub-system that produced this event (e.g. "peer", "vad", "signaling").
    pub subsystem: &'static str,
    /// Optional stream identifier (peer socket id or "local").
    pub stream_id: Option<String>,
    pub severity: Severity,
    /// Unix time in milliseconds when the event was captured.
    pub ts_ms: u64,
    /// Arbitrary key/value metrics.
    pub metrics: Vec<Metric>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Metric {
    pub name: &'static str,
    pub value: MetricValue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum MetricValue {
    I64(i64),
    U64(u64),
    F64(f64),
    Text(String),
}

// === Simple global broadcast bus (flume multi-producer multi-consumer) ===

use flume::{Receiver, Sender};

static BUS: Lazy<(Sender<DiagEvent>, Receiver<DiagEvent>)> = Lazy::new(flume::unbounded);

/// Obtain a sender that can publish diagnostics events.
pub fn global_sender() -> &'static Sender<DiagEvent> {
    &BUS.0
}

/// Subscribe to the diagnostics stream. Each subscriber receives **all**
/// future events.
pub fn subscribe() -> Receiver<DiagEvent> {
    BUS.1.clone()
}

/// Publish one event, ignoring send failures (the bus is unbounded, so the
/// only failure mode is a torn-down process).
pub fn publish(event: DiagEvent) {
    let _ = global_sender().send(event);
}

// === Helper utilities ===

/// Current wall-clock time in milliseconds.
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

// === metric! helper macro ===

/// Shorthand for constructing a [`Metric`].
#[macro_export]
macro_rules! metric {
    ($name:expr, $value:expr) => {
        $crate::Metric {
            name: $name,
            value: $crate::MetricValue::from($value),
        }
    };
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::I64(v)
    }
}
impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::U64(v)
    }
}
impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        MetricValue::U64(v as u64)
    }
}
impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::F64(v)
    }
}
impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}
impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_sees_published_events() {
        let rx = subscribe();
        publish(DiagEvent {
            subsystem: "peer",
            stream_id: Some("p1".into()),
            severity: Severity::Info,
            ts_ms: now_ms(),
            metrics: vec![metric!("rtt_ms", 42.0)],
        });
        let ev = rx.recv().unwrap();
        assert_eq!(ev.subsystem, "peer");
        assert_eq!(ev.metrics[0].value, MetricValue::F64(42.0));
    }

    #[test]
    fn severity_orders_from_debug_to_error() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn events_serialize_to_json() {
        let ev = DiagEvent {
            subsystem: "vad",
            stream_id: None,
            severity: Severity::Debug,
            ts_ms: 1,
            metrics: vec![metric!("volume", 12.5), metric!("state", "active")],
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"vad\""));
        assert!(json.contains("\"active\""));
    }
}
