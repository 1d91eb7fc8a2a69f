//! Scenario models.
//!
//! A scenario is an ordered list of recorded steps. Order is playback
//! order, and it only ever changes through the explicit insert, remove
//! and swap operations defined here.

use crate::geometry::{Point, Rect, Rgb};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

/// Mouse button used by a click step.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
}

/// Keyboard modifier held during a key press.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Cmd,
}

/// One recorded unit of a scenario.
///
/// Serialized with an internal `type` tag:
/// ```json
/// { "type": "click", "position": { "x": 100, "y": 400 }, "button": "left" }
/// ```
///
/// Unknown tags fail to deserialize rather than falling back to a default.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Step {
    /// Click a mouse button at an absolute position.
    Click { position: Point, button: MouseButton },

    /// Press a key, optionally with modifiers held.
    Keypress {
        key: String,
        #[serde(default)]
        modifiers: BTreeSet<Modifier>,
    },

    /// Wait a fixed number of milliseconds.
    Delay { ms: u64 },

    /// Wait until one pixel is within `threshold` of `color`.
    PixelState {
        position: Point,
        color: Rgb,
        threshold: f64,
    },

    /// Wait until any pixel of `rect` is within `threshold` of `color`.
    PixelZone { rect: Rect, color: Rgb, threshold: f64 },

    /// Play another scenario in place.
    ScenarioRef {
        #[serde(rename = "scenarioId")]
        scenario_id: Uuid,
    },
}

impl Step {
    /// The wire tag of this step.
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Click { .. } => "click",
            Step::Keypress { .. } => "keypress",
            Step::Delay { .. } => "delay",
            Step::PixelState { .. } => "pixel-state",
            Step::PixelZone { .. } => "pixel-zone",
            Step::ScenarioRef { .. } => "scenario-ref",
        }
    }
}

/// Errors raised by scenario step mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("Step index {index} is out of range for a scenario with {len} steps")]
    IndexOutOfRange { index: usize, len: usize },
}

/// A named, ordered sequence of steps.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    /// Unique identifier, referenced by `scenario-ref` steps.
    pub id: Uuid,

    pub name: String,

    /// Steps in playback order.
    #[serde(default)]
    pub steps: Vec<Step>,

    pub created_at: DateTime<Utc>,

    /// Updated each time the scenario is played.
    pub last_used_at: DateTime<Utc>,
}

impl Scenario {
    /// Create an empty scenario with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            steps: Vec::new(),
            created_at: now,
            last_used_at: now,
        }
    }

    /// Append a step at the end.
    pub fn push_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Insert a step at `index`, shifting later steps back by one.
    ///
    /// `index == len` appends.
    pub fn insert_step(&mut self, index: usize, step: Step) -> Result<(), ScenarioError> {
        if index > self.steps.len() {
            return Err(ScenarioError::IndexOutOfRange {
                index,
                len: self.steps.len(),
            });
        }
        self.steps.insert(index, step);
        Ok(())
    }

    /// Remove and return the step at `index`.
    pub fn remove_step(&mut self, index: usize) -> Result<Step, ScenarioError> {
        self.check_index(index)?;
        Ok(self.steps.remove(index))
    }

    /// Exchange two steps, leaving every other index untouched.
    pub fn swap_steps(&mut self, a: usize, b: usize) -> Result<(), ScenarioError> {
        self.check_index(a)?;
        self.check_index(b)?;
        self.steps.swap(a, b);
        Ok(())
    }

    /// Record that the scenario has just been played.
    pub fn touch(&mut self) {
        self.last_used_at = Utc::now();
    }

    fn check_index(&self, index: usize) -> Result<(), ScenarioError> {
        if index >= self.steps.len() {
            return Err(ScenarioError::IndexOutOfRange {
                index,
                len: self.steps.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(x: i32, y: i32) -> Step {
        Step::Click {
            position: Point::new(x, y),
            button: MouseButton::Left,
        }
    }

    #[test]
    fn test_insert_at_front_shifts_existing_steps() {
        let mut scenario = Scenario::new("login");
        scenario.push_step(click(1, 1));
        scenario.push_step(Step::Delay { ms: 200 });

        let keypress = Step::Keypress {
            key: "enter".to_string(),
            modifiers: BTreeSet::new(),
        };
        scenario.insert_step(0, keypress.clone()).unwrap();

        assert_eq!(scenario.steps.len(), 3);
        assert_eq!(scenario.steps[0], keypress);
        assert_eq!(scenario.steps[1], click(1, 1));
        assert_eq!(scenario.steps[2], Step::Delay { ms: 200 });
    }

    #[test]
    fn test_swap_only_touches_swapped_indices() {
        let mut scenario = Scenario::new("swap");
        for i in 0..4 {
            scenario.push_step(click(i, i));
        }

        scenario.swap_steps(0, 2).unwrap();

        assert_eq!(scenario.steps[0], click(2, 2));
        assert_eq!(scenario.steps[1], click(1, 1));
        assert_eq!(scenario.steps[2], click(0, 0));
        assert_eq!(scenario.steps[3], click(3, 3));
    }

    #[test]
    fn test_out_of_range_mutations_fail() {
        let mut scenario = Scenario::new("empty");
        assert_eq!(
            scenario.insert_step(1, Step::Delay { ms: 1 }),
            Err(ScenarioError::IndexOutOfRange { index: 1, len: 0 })
        );
        assert!(scenario.remove_step(0).is_err());
        assert!(scenario.swap_steps(0, 0).is_err());
    }

    #[test]
    fn test_unknown_step_tag_is_rejected() {
        let json = r#"{"type":"scroll","delta":3}"#;
        assert!(serde_json::from_str::<Step>(json).is_err());
    }

    #[test]
    fn test_step_kind_matches_wire_tag() {
        let step = Step::ScenarioRef {
            scenario_id: Uuid::new_v4(),
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["type"], step.kind());
        assert!(json.get("scenarioId").is_some());
    }
}
