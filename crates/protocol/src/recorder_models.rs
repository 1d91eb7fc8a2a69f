//! Recorder mode models.
//!
//! The recorder mode lives in the helper for the lifetime of the process
//! and decides which live input is forwarded as meaningful. Only the
//! orchestrator changes it, through `setRecorderState`.

use serde::{Deserialize, Serialize};

/// Top-level recorder state.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// Nothing is being captured.
    #[default]
    Idle,

    /// Capturing input actions (clicks or key presses).
    Action,

    /// Capturing wait conditions (pixel picks or delays).
    Transition,
}

/// Input channel armed under `action` or `transition`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecorderSubState {
    Mouse,
    Keyboard,
    Time,
    Pixel,
}

/// The full recorder mode: a state plus an optional sub-state.
///
/// Combinations are not validated; `transition` + `keyboard` is stored
/// as given and simply never admits any input.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecorderMode {
    pub state: RecorderState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_state: Option<RecorderSubState>,
}

impl RecorderMode {
    pub const IDLE: RecorderMode = RecorderMode {
        state: RecorderState::Idle,
        sub_state: None,
    };

    pub fn new(state: RecorderState, sub_state: Option<RecorderSubState>) -> Self {
        Self { state, sub_state }
    }

    pub fn action(sub_state: RecorderSubState) -> Self {
        Self::new(RecorderState::Action, Some(sub_state))
    }

    pub fn transition(sub_state: RecorderSubState) -> Self {
        Self::new(RecorderState::Transition, Some(sub_state))
    }

    /// Mouse clicks are meaningful only under `action` + `mouse`.
    pub fn captures_clicks(&self) -> bool {
        self.state == RecorderState::Action && self.sub_state == Some(RecorderSubState::Mouse)
    }

    /// Key presses are meaningful only under `action` + `keyboard`.
    pub fn captures_keys(&self) -> bool {
        self.state == RecorderState::Action && self.sub_state == Some(RecorderSubState::Keyboard)
    }

    /// Whether the recorder is waiting for a pixel pick.
    pub fn captures_pixels(&self) -> bool {
        self.state == RecorderState::Transition && self.sub_state == Some(RecorderSubState::Pixel)
    }
}

/// Icons shown on the recorder overlay.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OverlayIcon {
    Action,
    Transition,
    Mouse,
    Keyboard,
    Time,
}
