//! OS seam for input synthesis, screen sampling and input listening.
//!
//! The helper never touches the operating system directly. It talks to a
//! [`Desktop`], which is either the real desktop (feature `native`), a
//! scriptable [`MockDesktop`] or an [`UnsupportedDesktop`] that fails every
//! call with a clear message.

pub mod keys;
pub mod mock;
#[cfg(feature = "native")]
pub mod native;
pub mod unsupported;

use async_trait::async_trait;
use mk_protocol::geometry::{Point, Rect, Rgb};
use mk_protocol::ipc::Permissions;
use mk_protocol::recorder_models::OverlayIcon;
use mk_protocol::scenario_models::{Modifier, MouseButton};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

pub use mock::{MockAction, MockDesktop};
pub use unsupported::UnsupportedDesktop;

/// Errors reported by a [`Desktop`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// An input event could not be built or posted.
    #[error("{0}")]
    Action(String),

    /// Screen pixels could not be read.
    #[error("{0}")]
    Capture(String),

    /// The global input listener could not be started.
    #[error("{0}")]
    Listen(String),
}

/// Raw input observed on the desktop, before any recorder filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    MouseDown { position: Point, button: MouseButton },
    KeyDown {
        key: String,
        modifiers: BTreeSet<Modifier>,
    },

    /// An icon of the recorder overlay was clicked.
    OverlayIcon(OverlayIcon),

    /// A zone was dragged out on the recorder overlay.
    ZoneDragged(Rect),

    /// The recorder overlay was closed by the user.
    OverlayClosed,
}

/// Pixels of a captured region, stored row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelGrid {
    pub rect: Rect,
    pub pixels: Vec<Rgb>,
}

impl PixelGrid {
    /// Color at an absolute screen position, if it lies inside the grid.
    pub fn get(&self, point: Point) -> Option<Rgb> {
        if !self.rect.contains(point) {
            return None;
        }
        let dx = (i64::from(point.x) - i64::from(self.rect.x)) as usize;
        let dy = (i64::from(point.y) - i64::from(self.rect.y)) as usize;
        self.pixels
            .get(dy * self.rect.width as usize + dx)
            .copied()
    }

    /// Iterate positions and colors in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Point, Rgb)> + '_ {
        self.rect.points().zip(self.pixels.iter().copied())
    }
}

/// Access to the user's desktop.
///
/// Input synthesis and pixel reads are short and bounded. Implementations
/// that block must do so off the async runtime.
#[async_trait]
pub trait Desktop: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Current OS permission state. Never fails.
    async fn permissions(&self) -> Permissions;

    /// Bounds of every attached display.
    async fn displays(&self) -> Result<Vec<Rect>, PlatformError>;

    async fn click(&self, position: Point, button: MouseButton) -> Result<(), PlatformError>;

    async fn keypress(&self, key: &str, modifiers: &BTreeSet<Modifier>)
        -> Result<(), PlatformError>;

    /// Sample one pixel.
    async fn pixel(&self, position: Point) -> Result<Rgb, PlatformError>;

    /// Sample every pixel of `rect`.
    async fn capture(&self, rect: Rect) -> Result<PixelGrid, PlatformError>;

    /// Start forwarding raw input to `sink`.
    ///
    /// Called once per helper process. Events must be sent in the order the
    /// OS delivered them.
    fn listen(&self, sink: mpsc::UnboundedSender<InputEvent>) -> Result<(), PlatformError>;
}

/// Create the desktop for this build.
///
/// Returns the real desktop when built with the `native` feature and
/// `force_unsupported` is false, and an [`UnsupportedDesktop`] otherwise.
pub fn create_desktop(force_unsupported: bool) -> Arc<dyn Desktop> {
    #[cfg(feature = "native")]
    {
        if !force_unsupported {
            return Arc::new(native::NativeDesktop::new());
        }
    }

    #[cfg(not(feature = "native"))]
    let _ = force_unsupported;

    Arc::new(UnsupportedDesktop)
}
