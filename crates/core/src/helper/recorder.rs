//! Recorder mode cell.
//!
//! Holds the single [`RecorderMode`] of the helper process. Writes replace
//! the whole value; readers always see either the old or the new mode.

use mk_protocol::recorder_models::RecorderMode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared, last-writer-wins recorder mode.
#[derive(Clone)]
pub struct RecorderCell {
    tx: Arc<watch::Sender<RecorderMode>>,
}

impl Default for RecorderCell {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderCell {
    /// Start in `idle`.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RecorderMode::IDLE);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> RecorderMode {
        *self.tx.borrow()
    }

    /// Replace the mode. Any state/sub-state pair is accepted.
    pub fn set(&self, mode: RecorderMode) {
        let previous = self.tx.send_replace(mode);
        if previous != mode {
            info!(?previous, current = ?mode, "Recorder mode changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mk_protocol::recorder_models::{RecorderState, RecorderSubState};

    #[test]
    fn test_last_write_wins() {
        let cell = RecorderCell::new();
        assert_eq!(cell.get(), RecorderMode::IDLE);

        let other = cell.clone();
        cell.set(RecorderMode::action(RecorderSubState::Mouse));
        other.set(RecorderMode::new(
            RecorderState::Transition,
            Some(RecorderSubState::Keyboard),
        ));

        assert_eq!(
            cell.get(),
            RecorderMode::transition(RecorderSubState::Keyboard)
        );
    }
}
