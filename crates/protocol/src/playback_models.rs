//! Playback progress models.
//!
//! The playback engine reports what it is doing through [`PlaybackEvent`]s
//! so that a frontend can render progress without polling.

use crate::scenario_models::Step;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a playback run ended when no request failed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PlaybackOutcome {
    /// Every step ran and every wait matched.
    Completed,

    /// A pixel wait ran out of time. Steps after it were not played.
    ///
    /// This is a normal negative outcome, not a helper failure.
    #[serde(rename_all = "camelCase")]
    WaitTimedOut {
        scenario_id: Uuid,
        step_index: usize,
        elapsed_ms: u64,
    },
}

impl PlaybackOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PlaybackOutcome::Completed)
    }
}

/// Progress notifications emitted while a scenario plays.
///
/// Uses adjacently tagged serialization:
/// ```json
/// { "type": "stepStarted", "payload": { "scenarioId": "...", "index": 0, "step": { ... } } }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum PlaybackEvent {
    /// A scenario (top-level or referenced) started playing.
    #[serde(rename_all = "camelCase")]
    Started {
        scenario_id: Uuid,
        name: String,
        /// Nesting level, 0 for the scenario that was asked for.
        depth: usize,
    },

    #[serde(rename_all = "camelCase")]
    StepStarted {
        scenario_id: Uuid,
        index: usize,
        step: Step,
    },

    #[serde(rename_all = "camelCase")]
    StepCompleted { scenario_id: Uuid, index: usize },

    /// A pixel wait did not match within its budget.
    #[serde(rename_all = "camelCase")]
    WaitTimedOut {
        scenario_id: Uuid,
        index: usize,
        elapsed_ms: u64,
    },

    /// A scenario finished playing with the given outcome.
    #[serde(rename_all = "camelCase")]
    Finished {
        scenario_id: Uuid,
        outcome: PlaybackOutcome,
    },

    /// Playback stopped because a request or lookup failed.
    #[serde(rename_all = "camelCase")]
    Failed { scenario_id: Uuid, error: String },
}
