//! Room orchestration.

pub mod room_state;

#[cfg(target_arch = "wasm32")]
pub mod room_coordinator;

pub use room_state::{JoinOutcome, RoomAction, RoomChannel, RoomState};

#[cfg(target_arch = "wasm32")]
pub use room_coordinator::{RoomCoordinator, RoomOptions};
