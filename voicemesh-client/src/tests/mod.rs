//! Cross-module scenario tests for the voice core.

pub mod room_flow;
pub mod tuning_symmetry;
