//! Desktop used when the binary was built without OS support.

use super::{Desktop, InputEvent, PixelGrid, PlatformError};
use async_trait::async_trait;
use mk_protocol::geometry::{Point, Rect, Rgb};
use mk_protocol::ipc::Permissions;
use mk_protocol::scenario_models::{Modifier, MouseButton};
use std::collections::BTreeSet;
use tokio::sync::mpsc;

const HINT: &str = "desktop access is not available in this build (enable the `native` feature)";

/// Reports no permissions and fails every OS call.
pub struct UnsupportedDesktop;

#[async_trait]
impl Desktop for UnsupportedDesktop {
    fn name(&self) -> &str {
        "unsupported"
    }

    async fn permissions(&self) -> Permissions {
        Permissions {
            note: Some(HINT.to_string()),
            ..Permissions::default()
        }
    }

    async fn displays(&self) -> Result<Vec<Rect>, PlatformError> {
        Err(PlatformError::Capture(HINT.to_string()))
    }

    async fn click(&self, _position: Point, _button: MouseButton) -> Result<(), PlatformError> {
        Err(PlatformError::Action(HINT.to_string()))
    }

    async fn keypress(
        &self,
        _key: &str,
        _modifiers: &BTreeSet<Modifier>,
    ) -> Result<(), PlatformError> {
        Err(PlatformError::Action(HINT.to_string()))
    }

    async fn pixel(&self, _position: Point) -> Result<Rgb, PlatformError> {
        Err(PlatformError::Capture(HINT.to_string()))
    }

    async fn capture(&self, _rect: Rect) -> Result<PixelGrid, PlatformError> {
        Err(PlatformError::Capture(HINT.to_string()))
    }

    fn listen(&self, _sink: mpsc::UnboundedSender<InputEvent>) -> Result<(), PlatformError> {
        Err(PlatformError::Listen(HINT.to_string()))
    }
}
