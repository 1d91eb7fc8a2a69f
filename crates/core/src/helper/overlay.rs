//! Recorder overlay state.
//!
//! One [`Overlay`] exists per helper and is handed to the router and the
//! input listener at construction. Drawing is left to the desktop shell;
//! this type tracks what should be visible and where.

use mk_protocol::geometry::Point;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayState {
    pub visible: bool,
    pub position: Option<Point>,
    pub magnifier: bool,
}

#[derive(Default)]
pub struct Overlay {
    state: Mutex<OverlayState>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, OverlayState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> OverlayState {
        *self.lock()
    }

    /// Show the overlay. A given position moves it; `None` keeps the last one.
    pub fn show(&self, position: Option<Point>) {
        let mut state = self.lock();
        if position.is_some() {
            state.position = position;
        }
        if !state.visible {
            state.visible = true;
            info!(position = ?state.position, "Recorder overlay shown");
        }
    }

    /// Hide the overlay and its magnifier.
    pub fn hide(&self) {
        let mut state = self.lock();
        if state.visible || state.magnifier {
            state.visible = false;
            state.magnifier = false;
            info!("Recorder overlay hidden");
        }
    }

    pub fn show_magnifier(&self) {
        let mut state = self.lock();
        if !state.magnifier {
            state.magnifier = true;
            info!("Magnifier shown");
        }
    }

    pub fn hide_magnifier(&self) {
        let mut state = self.lock();
        if state.magnifier {
            state.magnifier = false;
            info!("Magnifier hidden");
        }
    }

    pub fn magnifier_visible(&self) -> bool {
        self.lock().magnifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_and_hide_are_idempotent() {
        let overlay = Overlay::new();
        overlay.show(Some(Point::new(10, 10)));
        overlay.show(None);
        assert_eq!(
            overlay.state(),
            OverlayState {
                visible: true,
                position: Some(Point::new(10, 10)),
                magnifier: false
            }
        );

        overlay.show_magnifier();
        overlay.show_magnifier();
        assert!(overlay.magnifier_visible());

        overlay.hide();
        overlay.hide();
        let state = overlay.state();
        assert!(!state.visible);
        assert!(!state.magnifier);
        assert_eq!(state.position, Some(Point::new(10, 10)));
    }
}
