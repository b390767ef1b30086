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

//! Shared types for the voicemesh voice chat client.
//!
//! This crate defines the contract between the voice core and everything
//! around it: the signaling wire protocol, participant/roster data, the
//! audio-quality tiers, and the framework-agnostic [`Callback`] the core
//! uses to talk to its host application. It is intentionally UI-framework
//! free — no yew, no dioxus, no DOM types.

pub mod callback;
pub mod participant;
pub mod quality;
pub mod signaling;

pub use callback::Callback;
pub use participant::{Participant, UserData, UserRole};
pub use quality::AudioQuality;
pub use signaling::{ClientSignal, IceCandidate, ServerSignal, SignalPayload};

/// Monitoring key for the local capture stream; remote streams are keyed by
/// their socket id, which never collides with this value.
pub const LOCAL_STREAM_KEY: &str = "local";
