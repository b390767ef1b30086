//! Local audio capture and capture settings.

mod capture;

pub use capture::{BrowserCapture, CaptureConfig, CaptureController};
pub(crate) use capture::stop_tracks;
