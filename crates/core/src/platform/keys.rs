//! Key names understood by `executeKeypress` and reported by `keyPressed`.
//!
//! Printable keys are single lowercase characters (`"a"`, `"7"`, `"/"`).
//! Everything else uses a lowercase name such as `"enter"` or `"f5"`.

use std::fmt;

/// Non-printable keys with a stable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Enter,
    Tab,
    Space,
    Backspace,
    Escape,
    Delete,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    F(u8),
}

/// A key that can be synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Named(NamedKey),
}

const NAMED: &[(&str, NamedKey)] = &[
    ("enter", NamedKey::Enter),
    ("return", NamedKey::Enter),
    ("tab", NamedKey::Tab),
    ("space", NamedKey::Space),
    ("backspace", NamedKey::Backspace),
    ("escape", NamedKey::Escape),
    ("esc", NamedKey::Escape),
    ("delete", NamedKey::Delete),
    ("up", NamedKey::Up),
    ("down", NamedKey::Down),
    ("left", NamedKey::Left),
    ("right", NamedKey::Right),
    ("home", NamedKey::Home),
    ("end", NamedKey::End),
    ("pageup", NamedKey::PageUp),
    ("pagedown", NamedKey::PageDown),
];

impl KeyCode {
    /// Parse a key name. Names are case-insensitive.
    pub fn parse(name: &str) -> Option<KeyCode> {
        let lower = name.to_ascii_lowercase();

        let mut chars = lower.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return match c {
                ' ' => Some(KeyCode::Named(NamedKey::Space)),
                c if c.is_ascii_graphic() => Some(KeyCode::Char(c)),
                _ => None,
            };
        }

        if let Some((_, key)) = NAMED.iter().find(|(n, _)| *n == lower) {
            return Some(KeyCode::Named(*key));
        }

        let n: u8 = lower.strip_prefix('f')?.parse().ok()?;
        (1..=12).contains(&n).then_some(KeyCode::Named(NamedKey::F(n)))
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCode::Char(c) => write!(f, "{c}"),
            KeyCode::Named(NamedKey::F(n)) => write!(f, "f{n}"),
            KeyCode::Named(named) => {
                let name = NAMED
                    .iter()
                    .find(|(_, k)| k == named)
                    .map(|(n, _)| *n)
                    .unwrap_or("unknown");
                f.write_str(name)
            }
        }
    }
}
