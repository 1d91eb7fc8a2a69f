//! Input action executors.
//!
//! Each action is a single synthesized click or key press. Nothing here
//! polls or retries.

use crate::helper::error::HelperError;
use crate::platform::Desktop;
use mk_protocol::ipc::{ClickParams, KeypressParams};
use tracing::debug;

pub async fn execute_click(desktop: &dyn Desktop, params: ClickParams) -> Result<(), HelperError> {
    debug!(position = ?params.position, button = ?params.button, "Click");
    desktop.click(params.position, params.button).await?;
    Ok(())
}

pub async fn execute_keypress(
    desktop: &dyn Desktop,
    params: &KeypressParams,
) -> Result<(), HelperError> {
    if params.key.is_empty() {
        return Err(HelperError::Action("key name is empty".to_string()));
    }
    debug!(key = %params.key, modifiers = ?params.modifiers, "Keypress");
    desktop.keypress(&params.key, &params.modifiers).await?;
    Ok(())
}
