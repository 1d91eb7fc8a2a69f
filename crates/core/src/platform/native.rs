//! Real desktop access: `rdev` for input, `xcap` for screen pixels.
//!
//! Both libraries are blocking, so every call runs on the blocking pool.
//! Overlay drawing is not done here; only mouse and keyboard input is
//! reported by the listener.

use super::keys::{KeyCode, NamedKey};
use super::{Desktop, InputEvent, PixelGrid, PlatformError};
use async_trait::async_trait;
use mk_protocol::geometry::{Point, Rect, Rgb};
use mk_protocol::ipc::Permissions;
use mk_protocol::scenario_models::{Modifier, MouseButton};
use rdev::{Button, EventType, Key};
use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Pause between synthesized events so the OS registers each of them.
const EVENT_GAP: Duration = Duration::from_millis(20);

const ACCESSIBILITY_UNVERIFIED: &str =
    "accessibility grant not verified; a denied grant makes clicks and key presses fail with ActionError";

pub struct NativeDesktop;

impl NativeDesktop {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeDesktop {
    fn default() -> Self {
        Self::new()
    }
}

async fn blocking<T, F>(f: F, wrap: fn(String) -> PlatformError) -> Result<T, PlatformError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PlatformError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| wrap(format!("blocking task failed: {e}")))?
}

fn send(event: &EventType) -> Result<(), PlatformError> {
    rdev::simulate(event)
        .map_err(|e| PlatformError::Action(format!("failed to post {event:?}: {e:?}")))?;
    thread::sleep(EVENT_GAP);
    Ok(())
}

fn modifier_key(modifier: Modifier) -> Key {
    match modifier {
        Modifier::Ctrl => Key::ControlLeft,
        Modifier::Alt => Key::Alt,
        Modifier::Shift => Key::ShiftLeft,
        Modifier::Cmd => Key::MetaLeft,
    }
}

fn modifier_of(key: Key) -> Option<Modifier> {
    match key {
        Key::ControlLeft | Key::ControlRight => Some(Modifier::Ctrl),
        Key::Alt | Key::AltGr => Some(Modifier::Alt),
        Key::ShiftLeft | Key::ShiftRight => Some(Modifier::Shift),
        Key::MetaLeft | Key::MetaRight => Some(Modifier::Cmd),
        _ => None,
    }
}

const CHAR_KEYS: &[(char, Key)] = &[
    ('a', Key::KeyA), ('b', Key::KeyB), ('c', Key::KeyC), ('d', Key::KeyD),
    ('e', Key::KeyE), ('f', Key::KeyF), ('g', Key::KeyG), ('h', Key::KeyH),
    ('i', Key::KeyI), ('j', Key::KeyJ), ('k', Key::KeyK), ('l', Key::KeyL),
    ('m', Key::KeyM), ('n', Key::KeyN), ('o', Key::KeyO), ('p', Key::KeyP),
    ('q', Key::KeyQ), ('r', Key::KeyR), ('s', Key::KeyS), ('t', Key::KeyT),
    ('u', Key::KeyU), ('v', Key::KeyV), ('w', Key::KeyW), ('x', Key::KeyX),
    ('y', Key::KeyY), ('z', Key::KeyZ),
    ('0', Key::Num0), ('1', Key::Num1), ('2', Key::Num2), ('3', Key::Num3),
    ('4', Key::Num4), ('5', Key::Num5), ('6', Key::Num6), ('7', Key::Num7),
    ('8', Key::Num8), ('9', Key::Num9),
    ('-', Key::Minus), ('=', Key::Equal), ('[', Key::LeftBracket),
    (']', Key::RightBracket), (';', Key::SemiColon), ('\'', Key::Quote),
    ('\\', Key::BackSlash), (',', Key::Comma), ('.', Key::Dot),
    ('/', Key::Slash), ('`', Key::BackQuote),
];

const NAMED_KEYS: &[(NamedKey, Key)] = &[
    (NamedKey::Enter, Key::Return),
    (NamedKey::Tab, Key::Tab),
    (NamedKey::Space, Key::Space),
    (NamedKey::Backspace, Key::Backspace),
    (NamedKey::Escape, Key::Escape),
    (NamedKey::Delete, Key::Delete),
    (NamedKey::Up, Key::UpArrow),
    (NamedKey::Down, Key::DownArrow),
    (NamedKey::Left, Key::LeftArrow),
    (NamedKey::Right, Key::RightArrow),
    (NamedKey::Home, Key::Home),
    (NamedKey::End, Key::End),
    (NamedKey::PageUp, Key::PageUp),
    (NamedKey::PageDown, Key::PageDown),
    (NamedKey::F(1), Key::F1),
    (NamedKey::F(2), Key::F2),
    (NamedKey::F(3), Key::F3),
    (NamedKey::F(4), Key::F4),
    (NamedKey::F(5), Key::F5),
    (NamedKey::F(6), Key::F6),
    (NamedKey::F(7), Key::F7),
    (NamedKey::F(8), Key::F8),
    (NamedKey::F(9), Key::F9),
    (NamedKey::F(10), Key::F10),
    (NamedKey::F(11), Key::F11),
    (NamedKey::F(12), Key::F12),
];

fn to_rdev(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::Char(c) => CHAR_KEYS.iter().find(|(ch, _)| *ch == c).map(|(_, k)| *k),
        KeyCode::Named(named) => NAMED_KEYS
            .iter()
            .find(|(n, _)| *n == named)
            .map(|(_, k)| *k),
    }
}

fn from_rdev(key: Key) -> Option<KeyCode> {
    if let Some((c, _)) = CHAR_KEYS.iter().find(|(_, k)| *k == key) {
        return Some(KeyCode::Char(*c));
    }
    NAMED_KEYS
        .iter()
        .find(|(_, k)| *k == key)
        .map(|(n, _)| KeyCode::Named(*n))
}

struct Monitor {
    bounds: Rect,
    inner: xcap::Monitor,
}

fn monitors() -> Result<Vec<Monitor>, PlatformError> {
    let capture = |what: &str, e: xcap::XCapError| {
        PlatformError::Capture(format!("failed to get monitor {what}: {e}"))
    };

    let all = xcap::Monitor::all()
        .map_err(|e| PlatformError::Capture(format!("failed to list monitors: {e}")))?;

    let mut result = Vec::with_capacity(all.len());
    for monitor in all {
        let bounds = Rect::new(
            monitor.x().map_err(|e| capture("x position", e))?,
            monitor.y().map_err(|e| capture("y position", e))?,
            monitor.width().map_err(|e| capture("width", e))?,
            monitor.height().map_err(|e| capture("height", e))?,
        );
        result.push(Monitor {
            bounds,
            inner: monitor,
        });
    }
    Ok(result)
}

/// Capture just `rect` from the monitor that holds it.
fn capture_region(rect: Rect) -> Result<PixelGrid, PlatformError> {
    let capture = |what: &str, e: xcap::XCapError| {
        PlatformError::Capture(format!("failed to {what}: {e}"))
    };

    let monitor = monitors()?
        .into_iter()
        .find(|m| m.bounds.contains_rect(&rect))
        .ok_or_else(|| PlatformError::Capture(format!("{rect:?} does not fit on one display")))?;
    let scale = f64::from(
        monitor
            .inner
            .scale_factor()
            .map_err(|e| capture("get monitor scale factor", e))?,
    );

    // The rect is in logical points relative to the display space; the
    // region is in physical pixels relative to the monitor. Both offsets
    // are non-negative because the monitor contains the rect.
    let physical = |logical: f64| (logical * scale) as u32;
    let x = physical(f64::from(rect.x - monitor.bounds.x));
    let y = physical(f64::from(rect.y - monitor.bounds.y));
    let max_width = physical(f64::from(monitor.bounds.width)).saturating_sub(x);
    let max_height = physical(f64::from(monitor.bounds.height)).saturating_sub(y);
    let width = physical(f64::from(rect.width)).clamp(1, max_width.max(1));
    let height = physical(f64::from(rect.height)).clamp(1, max_height.max(1));

    let image = monitor
        .inner
        .capture_region(x, y, width, height)
        .map_err(|e| capture("capture screen region", e))?;

    let scale_x = f64::from(image.width()) / f64::from(rect.width.max(1));
    let scale_y = f64::from(image.height()) / f64::from(rect.height.max(1));

    let mut pixels = Vec::with_capacity(rect.width as usize * rect.height as usize);
    for point in rect.points() {
        let lx = f64::from(point.x - rect.x);
        let ly = f64::from(point.y - rect.y);
        let px = ((lx * scale_x) as u32).min(image.width().saturating_sub(1));
        let py = ((ly * scale_y) as u32).min(image.height().saturating_sub(1));
        let [r, g, b, _] = image.get_pixel(px, py).0;
        pixels.push(Rgb::new(r, g, b));
    }

    Ok(PixelGrid { rect, pixels })
}

#[async_trait]
impl Desktop for NativeDesktop {
    fn name(&self) -> &str {
        "native"
    }

    async fn permissions(&self) -> Permissions {
        let screen_capture = blocking(
            || Ok(monitors().map(|m| !m.is_empty()).unwrap_or(false)),
            PlatformError::Capture,
        )
        .await
        .unwrap_or(false);

        // rdev cannot query the accessibility grant. The flag reports that
        // posting is attempted; a denied grant fails the post instead.
        Permissions {
            accessibility: true,
            screen_capture,
            note: Some(ACCESSIBILITY_UNVERIFIED.to_string()),
        }
    }

    async fn displays(&self) -> Result<Vec<Rect>, PlatformError> {
        blocking(
            || Ok(monitors()?.into_iter().map(|m| m.bounds).collect()),
            PlatformError::Capture,
        )
        .await
    }

    async fn click(&self, position: Point, button: MouseButton) -> Result<(), PlatformError> {
        let button = match button {
            MouseButton::Left => Button::Left,
            MouseButton::Right => Button::Right,
        };
        blocking(
            move || {
                send(&EventType::MouseMove {
                    x: f64::from(position.x),
                    y: f64::from(position.y),
                })?;
                send(&EventType::ButtonPress(button))?;
                send(&EventType::ButtonRelease(button))
            },
            PlatformError::Action,
        )
        .await
    }

    async fn keypress(
        &self,
        key: &str,
        modifiers: &BTreeSet<Modifier>,
    ) -> Result<(), PlatformError> {
        let target = KeyCode::parse(key)
            .and_then(to_rdev)
            .ok_or_else(|| PlatformError::Action(format!("unknown key name '{key}'")))?;
        let held: Vec<Key> = modifiers.iter().copied().map(modifier_key).collect();

        blocking(
            move || {
                for key in &held {
                    send(&EventType::KeyPress(*key))?;
                }
                let result = send(&EventType::KeyPress(target))
                    .and_then(|()| send(&EventType::KeyRelease(target)));
                for key in held.iter().rev() {
                    send(&EventType::KeyRelease(*key))?;
                }
                result
            },
            PlatformError::Action,
        )
        .await
    }

    async fn pixel(&self, position: Point) -> Result<Rgb, PlatformError> {
        let grid = self.capture(Rect::new(position.x, position.y, 1, 1)).await?;
        grid.pixels
            .first()
            .copied()
            .ok_or_else(|| PlatformError::Capture("empty capture".to_string()))
    }

    async fn capture(&self, rect: Rect) -> Result<PixelGrid, PlatformError> {
        blocking(move || capture_region(rect), PlatformError::Capture).await
    }

    fn listen(&self, sink: mpsc::UnboundedSender<InputEvent>) -> Result<(), PlatformError> {
        thread::Builder::new()
            .name("mk-input-listener".to_string())
            .spawn(move || {
                let mut cursor = Point::new(0, 0);
                let mut held: BTreeSet<Modifier> = BTreeSet::new();

                let result = rdev::listen(move |event| {
                    let input = match event.event_type {
                        EventType::MouseMove { x, y } => {
                            cursor = Point::new(x as i32, y as i32);
                            None
                        }
                        EventType::ButtonPress(Button::Left) => Some(InputEvent::MouseDown {
                            position: cursor,
                            button: MouseButton::Left,
                        }),
                        EventType::ButtonPress(Button::Right) => Some(InputEvent::MouseDown {
                            position: cursor,
                            button: MouseButton::Right,
                        }),
                        EventType::KeyPress(key) => match modifier_of(key) {
                            Some(modifier) => {
                                held.insert(modifier);
                                None
                            }
                            None => from_rdev(key).map(|code| InputEvent::KeyDown {
                                key: code.to_string(),
                                modifiers: held.clone(),
                            }),
                        },
                        EventType::KeyRelease(key) => {
                            if let Some(modifier) = modifier_of(key) {
                                held.remove(&modifier);
                            }
                            None
                        }
                        _ => None,
                    };

                    if let Some(input) = input {
                        debug!(?input, "Raw input");
                        let _ = sink.send(input);
                    }
                });

                if let Err(e) = result {
                    error!("Input listener stopped: {e:?}");
                }
            })
            .map(|_| ())
            .map_err(|e| PlatformError::Listen(format!("failed to start listener thread: {e}")))
    }
}
