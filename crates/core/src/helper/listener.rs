//! Standing input listener.
//!
//! Turns raw desktop input into protocol events. A single task handles the
//! raw input in arrival order, so events are never reordered. Clicks and
//! key presses are forwarded only when the recorder mode captures them;
//! overlay interactions are always forwarded.

use crate::helper::overlay::Overlay;
use crate::helper::recorder::RecorderCell;
use crate::helper::transport::Outbound;
use crate::platform::{Desktop, InputEvent};
use mk_protocol::geometry::Point;
use mk_protocol::ipc::HelperEvent;
use mk_protocol::recorder_models::RecorderMode;
use mk_protocol::scenario_models::MouseButton;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What to do with one raw input.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Forward this event.
    Forward(HelperEvent),
    /// Sample the pixel under a magnifier click and report it.
    PickPixel(Point),
    /// Not meaningful in the current mode.
    Drop,
}

/// Decide what a raw input means under `mode`.
pub fn classify(input: InputEvent, mode: RecorderMode, magnifier: bool) -> Disposition {
    match input {
        InputEvent::MouseDown {
            position,
            button: MouseButton::Left,
        } if magnifier => Disposition::PickPixel(position),
        InputEvent::MouseDown { position, button } if mode.captures_clicks() => {
            Disposition::Forward(HelperEvent::MouseClicked { position, button })
        }
        InputEvent::KeyDown { key, modifiers } if mode.captures_keys() => {
            Disposition::Forward(HelperEvent::KeyPressed { key, modifiers })
        }
        InputEvent::MouseDown { .. } | InputEvent::KeyDown { .. } => Disposition::Drop,
        InputEvent::OverlayIcon(icon) => {
            Disposition::Forward(HelperEvent::OverlayIconClicked { icon })
        }
        InputEvent::ZoneDragged(rect) => Disposition::Forward(HelperEvent::ZoneSelected { rect }),
        InputEvent::OverlayClosed => Disposition::Forward(HelperEvent::OverlayClosed),
    }
}

/// Consumes raw input and writes the resulting events.
pub struct InputListener {
    desktop: Arc<dyn Desktop>,
    recorder: RecorderCell,
    overlay: Arc<Overlay>,
    outbound: Outbound,
}

impl InputListener {
    pub fn new(
        desktop: Arc<dyn Desktop>,
        recorder: RecorderCell,
        overlay: Arc<Overlay>,
        outbound: Outbound,
    ) -> Self {
        Self {
            desktop,
            recorder,
            overlay,
            outbound,
        }
    }

    /// Run until the raw input source or the outbound queue closes.
    pub async fn run(self, mut raw: mpsc::UnboundedReceiver<InputEvent>) {
        while let Some(input) = raw.recv().await {
            let closing = matches!(input, InputEvent::OverlayClosed);
            let disposition = classify(input, self.recorder.get(), self.overlay.magnifier_visible());

            let event = match disposition {
                Disposition::Forward(event) => event,
                Disposition::PickPixel(position) => match self.desktop.pixel(position).await {
                    Ok(color) => HelperEvent::PixelSelected { position, color },
                    Err(e) => {
                        warn!("Failed to sample picked pixel at {position:?}: {e}");
                        continue;
                    }
                },
                Disposition::Drop => {
                    debug!(mode = ?self.recorder.get(), "Input not captured in current mode");
                    continue;
                }
            };

            if closing {
                self.overlay.hide();
            }

            let message = match event.to_message() {
                Ok(message) => message,
                Err(e) => {
                    warn!("Failed to encode {} event: {e}", event.name());
                    continue;
                }
            };
            if !self.outbound.send(message) {
                break;
            }
        }
        debug!("Input listener stopped");
    }
}
