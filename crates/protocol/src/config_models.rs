//! Global configuration models for `.macro-kit/config.toml`.
//!
//! Every key is optional. A missing file, a missing table or a missing
//! key all fall back to the defaults defined here.

use crate::geometry::Point;
use crate::ipc::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};
use serde::Deserialize;
use serde::Serialize;

/// Threshold given to newly recorded pixel steps.
pub const DEFAULT_PIXEL_THRESHOLD: f64 = 10.0;

/// Represents global settings from `.macro-kit/config.toml`.
///
/// # Example
///
/// ```toml
/// # .macro-kit/config.toml
/// helper_command = "/usr/local/bin/macro-kit-helper"
///
/// [helper]
/// poll_interval_ms = 25
///
/// [recorder]
/// default_threshold = 12.5
/// overlay_position = { x = 40, y = 40 }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct GlobalConfig {
    #[serde(default)]
    pub helper: HelperSettings,

    #[serde(default)]
    pub recorder: RecorderSettings,

    /// Program to launch as the helper. When unset, the orchestrator
    /// falls back to `MACRO_KIT_HELPER` and then to its own binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_command: Option<String>,
}

/// Pixel polling settings used by the helper.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelperSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Budget for pixel waits that do not carry their own `timeoutMs`.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
}

impl Default for HelperSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            default_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
        }
    }
}

/// Settings read when recorded steps are built.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RecorderSettings {
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,

    /// Last known position of the recorder overlay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_position: Option<Point>,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_PIXEL_THRESHOLD,
            overlay_position: None,
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_timeout_ms() -> u64 {
    DEFAULT_WAIT_TIMEOUT_MS
}

fn default_threshold() -> f64 {
    DEFAULT_PIXEL_THRESHOLD
}
