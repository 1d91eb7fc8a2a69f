//! Scriptable in-memory desktop.
//!
//! Records every synthesized action, serves pixels from an editable
//! framebuffer and lets tests inject raw input as if the user produced it.

use super::keys::KeyCode;
use super::{Desktop, InputEvent, PixelGrid, PlatformError};
use async_trait::async_trait;
use mk_protocol::geometry::{Point, Rect, Rgb};
use mk_protocol::ipc::Permissions;
use mk_protocol::scenario_models::{Modifier, MouseButton};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

/// An action synthesized through the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockAction {
    Click { position: Point, button: MouseButton },
    Keypress {
        key: String,
        modifiers: BTreeSet<Modifier>,
    },
}

struct MockState {
    screen: Rect,
    background: Rgb,
    pixels: HashMap<Point, Rgb>,
    permissions: Permissions,
    capture_denied: bool,
    actions: Vec<MockAction>,
    captures: usize,
    sink: Option<mpsc::UnboundedSender<InputEvent>>,
    backlog: Vec<InputEvent>,
}

/// In-memory [`Desktop`] used by tests and demos.
pub struct MockDesktop {
    state: Mutex<MockState>,
}

impl Default for MockDesktop {
    fn default() -> Self {
        Self::new(Rect::new(0, 0, 1920, 1080))
    }
}

impl MockDesktop {
    /// Create a mock with one display of the given bounds, filled black.
    pub fn new(screen: Rect) -> Self {
        Self {
            state: Mutex::new(MockState {
                screen,
                background: Rgb::default(),
                pixels: HashMap::new(),
                permissions: Permissions {
                    accessibility: true,
                    screen_capture: true,
                    note: None,
                },
                capture_denied: false,
                actions: Vec::new(),
                captures: 0,
                sink: None,
                backlog: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the state from the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_background(&self, color: Rgb) {
        self.lock().background = color;
    }

    pub fn set_pixel(&self, position: Point, color: Rgb) {
        self.lock().pixels.insert(position, color);
    }

    pub fn fill_rect(&self, rect: Rect, color: Rgb) {
        let mut state = self.lock();
        for point in rect.points() {
            state.pixels.insert(point, color);
        }
    }

    pub fn set_permissions(&self, permissions: Permissions) {
        self.lock().permissions = permissions;
    }

    /// Make every capture fail as if screen recording were denied.
    pub fn deny_capture(&self, denied: bool) {
        self.lock().capture_denied = denied;
    }

    /// Actions synthesized so far, oldest first.
    pub fn actions(&self) -> Vec<MockAction> {
        self.lock().actions.clone()
    }

    /// Number of pixel or region captures served so far.
    pub fn captures(&self) -> usize {
        self.lock().captures
    }

    /// Feed raw input to the listener.
    ///
    /// Input sent before the listener starts is queued and delivered when
    /// it does.
    pub fn inject(&self, event: InputEvent) {
        let mut state = self.lock();
        match &state.sink {
            Some(sink) if !sink.is_closed() => {
                let _ = sink.send(event);
            }
            _ => state.backlog.push(event),
        }
    }

    fn sample(state: &MockState, point: Point) -> Rgb {
        state.pixels.get(&point).copied().unwrap_or(state.background)
    }

    fn check_capture(state: &mut MockState) -> Result<(), PlatformError> {
        if state.capture_denied {
            return Err(PlatformError::Capture(
                "screen capture permission denied".to_string(),
            ));
        }
        state.captures += 1;
        Ok(())
    }
}

#[async_trait]
impl Desktop for MockDesktop {
    fn name(&self) -> &str {
        "mock"
    }

    async fn permissions(&self) -> Permissions {
        self.lock().permissions.clone()
    }

    async fn displays(&self) -> Result<Vec<Rect>, PlatformError> {
        Ok(vec![self.lock().screen])
    }

    async fn click(&self, position: Point, button: MouseButton) -> Result<(), PlatformError> {
        let mut state = self.lock();
        if !state.permissions.accessibility {
            return Err(PlatformError::Action(
                "accessibility permission denied".to_string(),
            ));
        }
        state.actions.push(MockAction::Click { position, button });
        Ok(())
    }

    async fn keypress(
        &self,
        key: &str,
        modifiers: &BTreeSet<Modifier>,
    ) -> Result<(), PlatformError> {
        let code = KeyCode::parse(key)
            .ok_or_else(|| PlatformError::Action(format!("unknown key name '{key}'")))?;

        let mut state = self.lock();
        if !state.permissions.accessibility {
            return Err(PlatformError::Action(
                "accessibility permission denied".to_string(),
            ));
        }
        state.actions.push(MockAction::Keypress {
            key: code.to_string(),
            modifiers: modifiers.clone(),
        });
        Ok(())
    }

    async fn pixel(&self, position: Point) -> Result<Rgb, PlatformError> {
        let mut state = self.lock();
        Self::check_capture(&mut state)?;
        Ok(Self::sample(&state, position))
    }

    async fn capture(&self, rect: Rect) -> Result<PixelGrid, PlatformError> {
        let mut state = self.lock();
        Self::check_capture(&mut state)?;
        let pixels = rect.points().map(|p| Self::sample(&state, p)).collect();
        Ok(PixelGrid { rect, pixels })
    }

    fn listen(&self, sink: mpsc::UnboundedSender<InputEvent>) -> Result<(), PlatformError> {
        let mut state = self.lock();
        for event in state.backlog.drain(..) {
            let _ = sink.send(event);
        }
        state.sink = Some(sink);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_framebuffer_and_actions() {
        let mock = MockDesktop::new(Rect::new(0, 0, 100, 100));
        mock.set_background(Rgb::new(9, 9, 9));
        mock.set_pixel(Point::new(5, 5), Rgb::new(255, 0, 0));

        assert_eq!(mock.pixel(Point::new(5, 5)).await.unwrap(), Rgb::new(255, 0, 0));
        assert_eq!(mock.pixel(Point::new(6, 5)).await.unwrap(), Rgb::new(9, 9, 9));
        assert_eq!(mock.captures(), 2);

        mock.click(Point::new(1, 2), MouseButton::Right).await.unwrap();
        assert!(mock.keypress("nope-key", &BTreeSet::new()).await.is_err());
        assert_eq!(
            mock.actions(),
            vec![MockAction::Click {
                position: Point::new(1, 2),
                button: MouseButton::Right
            }]
        );
    }

    #[tokio::test]
    async fn test_input_injected_before_listen_is_queued() {
        let mock = MockDesktop::default();
        mock.inject(InputEvent::OverlayClosed);

        let (tx, mut rx) = mpsc::unbounded_channel();
        mock.listen(tx).unwrap();
        mock.inject(InputEvent::ZoneDragged(Rect::new(1, 1, 2, 2)));

        assert_eq!(rx.recv().await, Some(InputEvent::OverlayClosed));
        assert_eq!(
            rx.recv().await,
            Some(InputEvent::ZoneDragged(Rect::new(1, 1, 2, 2)))
        );
    }

    #[tokio::test]
    async fn test_denied_capture_fails() {
        let mock = MockDesktop::default();
        mock.deny_capture(true);
        assert!(matches!(
            mock.pixel(Point::new(0, 0)).await,
            Err(PlatformError::Capture(_))
        ));
    }
}
