//! WebSocket transport for the signaling boundary.
//!
//! Forked from yew-websocket (MIT licensed, Copyright (c) 2017 Denis
//! Kolodin), reduced to text frames and adapted to parse every inbound
//! frame into a [`ServerSignal`] at the boundary.

use super::{SignalingChannel, SignalingStatus};
use gloo::events::EventListener;
use log::{debug, error, warn};
use thiserror::Error;
use voicemesh_types::{Callback, ClientSignal, ServerSignal};
use wasm_bindgen::JsCast;
use web_sys::{BinaryType, Event, MessageEvent, WebSocket};

#[derive(Clone, Debug, PartialEq, Error)]
pub enum SignalingError {
    #[error("{0}")]
    CreationError(String),
}

/// A live WebSocket signaling connection. Dropping the value closes the
/// connection.
#[must_use = "the connection is closed when the handle is dropped"]
pub struct WebSocketSignaling {
    ws: WebSocket,
    #[allow(dead_code)]
    listeners: [EventListener; 4],
}

impl WebSocketSignaling {
    /// Open a connection. `on_event` receives every well-formed inbound
    /// signal; malformed frames are logged and dropped. `on_status`
    /// receives open/close/error notifications.
    pub fn connect(
        url: &str,
        on_event: Callback<ServerSignal>,
        on_status: Callback<SignalingStatus>,
    ) -> anyhow::Result<Self> {
        let ws = WebSocket::new(url)
            .map_err(|e| SignalingError::CreationError(format!("{e:?}")))?;
        ws.set_binary_type(BinaryType::Arraybuffer);
        debug!("signaling connecting to {url}");

        let open = {
            let on_status = on_status.clone();
            EventListener::new(&ws, "open", move |_: &Event| {
                on_status.emit(SignalingStatus::Opened);
            })
        };
        let close = {
            let on_status = on_status.clone();
            EventListener::new(&ws, "close", move |_: &Event| {
                on_status.emit(SignalingStatus::Closed);
            })
        };
        let error_listener = EventListener::new(&ws, "error", move |_: &Event| {
            on_status.emit(SignalingStatus::Error("websocket error".to_string()));
        });
        let message = EventListener::new(&ws, "message", move |event: &Event| {
            let Some(event) = event.dyn_ref::<MessageEvent>() else {
                return;
            };
            let Some(text) = event.data().as_string() else {
                warn!("ignoring non-text signaling frame");
                return;
            };
            match ServerSignal::from_frame(&text) {
                Ok(signal) => on_event.emit(signal),
                Err(e) => warn!("dropping malformed signaling frame: {e}"),
            }
        });

        Ok(Self {
            ws,
            listeners: [open, close, error_listener, message],
        })
    }

    pub fn close(&self) {
        let _ = self.ws.close();
    }
}

impl SignalingChannel for WebSocketSignaling {
    fn send(&self, signal: ClientSignal) {
        let frame = match signal.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("failed to encode outbound signal: {e}");
                return;
            }
        };
        if let Err(e) = self.ws.send_with_str(&frame) {
            error!("failed to send signaling frame: {e:?}");
        }
    }
}

impl Drop for WebSocketSignaling {
    fn drop(&mut self) {
        let _ = self.ws.close();
    }
}
