//! Request router.
//!
//! Maps each [`Command`] to its handler and turns the handler's outcome
//! into exactly one [`Response`]. The router is cheap to clone; every
//! in-flight request holds its own copy.

use crate::helper::actions::{execute_click, execute_keypress};
use crate::helper::error::HelperError;
use crate::helper::overlay::Overlay;
use crate::helper::pixel::PixelEngine;
use crate::helper::recorder::RecorderCell;
use crate::platform::Desktop;
use mk_protocol::config_models::HelperSettings;
use mk_protocol::ipc::{Command, PixelColorResult, Response};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Router {
    desktop: Arc<dyn Desktop>,
    recorder: RecorderCell,
    overlay: Arc<Overlay>,
    pixels: PixelEngine,
}

impl Router {
    /// Create a router over the helper's shared resources.
    ///
    /// # Arguments
    ///
    /// * `desktop` - OS access used by actions and pixel reads
    /// * `recorder` - The process-wide recorder mode cell
    /// * `overlay` - The single overlay owned by this helper
    /// * `settings` - Poll interval and default wait budget
    pub fn new(
        desktop: Arc<dyn Desktop>,
        recorder: RecorderCell,
        overlay: Arc<Overlay>,
        settings: HelperSettings,
    ) -> Self {
        let pixels = PixelEngine::new(desktop.clone(), settings);
        Self {
            desktop,
            recorder,
            overlay,
            pixels,
        }
    }

    pub fn recorder(&self) -> &RecorderCell {
        &self.recorder
    }

    pub fn overlay(&self) -> &Arc<Overlay> {
        &self.overlay
    }

    /// Handle one command and build its response.
    pub async fn respond(&self, id: String, command: Command) -> Response {
        let method = command.method();
        match self.handle(command).await {
            Ok(result) => {
                debug!(%id, method, "Request succeeded");
                Response::success(id, result)
            }
            Err(e) => {
                warn!(%id, method, "Request failed: {e}");
                Response::failure(id, e.to_string())
            }
        }
    }

    /// Run the handler for `command`. `Ok(None)` is a void success.
    pub async fn handle(&self, command: Command) -> Result<Option<Value>, HelperError> {
        match command {
            Command::CheckPermissions => to_result(self.desktop.permissions().await),
            Command::ShowRecorderOverlay(params) => {
                self.overlay.show(params.position);
                Ok(None)
            }
            Command::HideRecorderOverlay => {
                self.overlay.hide();
                Ok(None)
            }
            Command::SetRecorderState(mode) => {
                self.recorder.set(mode);
                Ok(None)
            }
            Command::ShowMagnifier => {
                self.overlay.show_magnifier();
                Ok(None)
            }
            Command::HideMagnifier => {
                self.overlay.hide_magnifier();
                Ok(None)
            }
            Command::ExecuteClick(params) => {
                execute_click(self.desktop.as_ref(), params).await?;
                Ok(None)
            }
            Command::ExecuteKeypress(params) => {
                execute_keypress(self.desktop.as_ref(), &params).await?;
                Ok(None)
            }
            Command::GetPixelColor(params) => {
                let color = self.pixels.get_pixel_color(params.position).await?;
                to_result(PixelColorResult { color })
            }
            Command::WaitForPixelState(params) => {
                to_result(self.pixels.wait_for_pixel_state(params).await?)
            }
            Command::WaitForPixelZone(params) => {
                to_result(self.pixels.wait_for_pixel_zone(params).await?)
            }
        }
    }
}

fn to_result<T: Serialize>(value: T) -> Result<Option<Value>, HelperError> {
    serde_json::to_value(value)
        .map(Some)
        .map_err(|e| HelperError::Capture(format!("failed to encode result: {e}")))
}
