//! Scenario playback engine.
//!
//! The PlaybackEngine replays a stored scenario step by step through a
//! helper, following `scenario-ref` steps into nested scenarios. A pixel
//! wait that runs out of time stops playback with
//! [`PlaybackOutcome::WaitTimedOut`]; a request the helper rejects stops it
//! with a [`PlaybackError`].

use crate::client::{ClientError, HelperClient};
use crate::scenario::{ScenarioStore, StoreError};
use mk_protocol::ipc::{WaitPixelStateParams, WaitPixelZoneParams, WaitResult};
use mk_protocol::playback_models::{PlaybackEvent, PlaybackOutcome};
use mk_protocol::scenario_models::Step;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Step {index} of scenario {scenario_id} failed: {source}")]
    Step {
        scenario_id: Uuid,
        index: usize,
        #[source]
        source: ClientError,
    },

    /// A `scenario-ref` led back into a scenario that is already playing.
    #[error("Scenario {0} references itself")]
    Cycle(Uuid),
}

type PlayFuture<'a> = Pin<Box<dyn Future<Output = Result<PlaybackOutcome, PlaybackError>> + Send + 'a>>;

/// What a single step ended with.
enum StepOutcome {
    Done,
    TimedOut(u64),
    Nested(PlaybackOutcome),
}

/// Replays scenarios through a helper.
pub struct PlaybackEngine {
    client: Arc<HelperClient>,
    store: Arc<dyn ScenarioStore>,
    wait_timeout_ms: Option<u64>,
}

impl PlaybackEngine {
    /// Create a new PlaybackEngine.
    ///
    /// # Arguments
    ///
    /// * `client` - Connection to the helper that performs each step
    /// * `store` - Source of the scenarios to play
    pub fn new(client: Arc<HelperClient>, store: Arc<dyn ScenarioStore>) -> Self {
        Self {
            client,
            store,
            wait_timeout_ms: None,
        }
    }

    /// Budget for every pixel wait. Without one the helper's default applies.
    pub fn with_wait_timeout(mut self, timeout_ms: u64) -> Self {
        self.wait_timeout_ms = Some(timeout_ms);
        self
    }

    /// Play a scenario to the end.
    ///
    /// Emits `Started` for every scenario entered, `StepStarted` and
    /// `StepCompleted` around each step, and exactly one of `Finished` or
    /// `Failed` at the end. Every scenario entered has its `lastUsedAt`
    /// refreshed.
    ///
    /// # Arguments
    ///
    /// * `scenario_id` - The scenario to play
    /// * `events_tx` - Channel for progress events
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A scenario is missing from the store
    /// - The helper rejects a step or disconnects
    /// - A `scenario-ref` forms a cycle
    pub async fn run(
        &self,
        scenario_id: Uuid,
        events_tx: Sender<PlaybackEvent>,
    ) -> Result<PlaybackOutcome, PlaybackError> {
        let mut stack = Vec::new();
        let result = self.play(scenario_id, &mut stack, &events_tx).await;

        match &result {
            Ok(outcome) => {
                info!(%scenario_id, ?outcome, "Playback finished");
                let _ = events_tx
                    .send(PlaybackEvent::Finished {
                        scenario_id,
                        outcome: outcome.clone(),
                    })
                    .await;
            }
            Err(e) => {
                warn!(%scenario_id, "Playback failed: {e}");
                let _ = events_tx
                    .send(PlaybackEvent::Failed {
                        scenario_id,
                        error: e.to_string(),
                    })
                    .await;
            }
        }
        result
    }

    fn play<'a>(
        &'a self,
        scenario_id: Uuid,
        stack: &'a mut Vec<Uuid>,
        events_tx: &'a Sender<PlaybackEvent>,
    ) -> PlayFuture<'a> {
        Box::pin(async move {
            if stack.contains(&scenario_id) {
                return Err(PlaybackError::Cycle(scenario_id));
            }

            let scenario = self.store.get(scenario_id).await?;
            self.store.touch(scenario_id).await?;
            info!(scenario = %scenario.name, depth = stack.len(), steps = scenario.steps.len(), "Playing scenario");

            let _ = events_tx
                .send(PlaybackEvent::Started {
                    scenario_id,
                    name: scenario.name.clone(),
                    depth: stack.len(),
                })
                .await;

            stack.push(scenario_id);
            for (index, step) in scenario.steps.iter().enumerate() {
                let _ = events_tx
                    .send(PlaybackEvent::StepStarted {
                        scenario_id,
                        index,
                        step: step.clone(),
                    })
                    .await;

                let outcome = match self.execute(step, stack, events_tx).await {
                    Ok(outcome) => outcome,
                    Err(StepError::Client(source)) => {
                        return Err(PlaybackError::Step {
                            scenario_id,
                            index,
                            source,
                        })
                    }
                    Err(StepError::Playback(e)) => return Err(e),
                };

                match outcome {
                    StepOutcome::Done | StepOutcome::Nested(PlaybackOutcome::Completed) => {
                        let _ = events_tx
                            .send(PlaybackEvent::StepCompleted { scenario_id, index })
                            .await;
                    }
                    StepOutcome::TimedOut(elapsed_ms) => {
                        let _ = events_tx
                            .send(PlaybackEvent::WaitTimedOut {
                                scenario_id,
                                index,
                                elapsed_ms,
                            })
                            .await;
                        return Ok(PlaybackOutcome::WaitTimedOut {
                            scenario_id,
                            step_index: index,
                            elapsed_ms,
                        });
                    }
                    StepOutcome::Nested(timed_out) => return Ok(timed_out),
                }
            }
            stack.pop();

            Ok(PlaybackOutcome::Completed)
        })
    }

    async fn execute(
        &self,
        step: &Step,
        stack: &mut Vec<Uuid>,
        events_tx: &Sender<PlaybackEvent>,
    ) -> Result<StepOutcome, StepError> {
        debug!(kind = step.kind(), "Executing step");
        match step {
            Step::Click { position, button } => {
                self.client.execute_click(*position, *button).await?;
            }
            Step::Keypress { key, modifiers } => {
                self.client
                    .execute_keypress(key.as_str(), modifiers.clone())
                    .await?;
            }
            Step::Delay { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
            Step::PixelState {
                position,
                color,
                threshold,
            } => {
                let result = self
                    .client
                    .wait_for_pixel_state(WaitPixelStateParams {
                        position: *position,
                        color: *color,
                        threshold: *threshold,
                        timeout_ms: self.wait_timeout_ms,
                    })
                    .await?;
                return Ok(wait_outcome(result));
            }
            Step::PixelZone {
                rect,
                color,
                threshold,
            } => {
                let result = self
                    .client
                    .wait_for_pixel_zone(WaitPixelZoneParams {
                        rect: *rect,
                        color: *color,
                        threshold: *threshold,
                        timeout_ms: self.wait_timeout_ms,
                    })
                    .await?;
                return Ok(wait_outcome(result));
            }
            Step::ScenarioRef { scenario_id } => {
                let nested = self.play(*scenario_id, stack, events_tx).await?;
                return Ok(StepOutcome::Nested(nested));
            }
        }
        Ok(StepOutcome::Done)
    }
}

enum StepError {
    Client(ClientError),
    Playback(PlaybackError),
}

impl From<ClientError> for StepError {
    fn from(e: ClientError) -> Self {
        StepError::Client(e)
    }
}

impl From<PlaybackError> for StepError {
    fn from(e: PlaybackError) -> Self {
        StepError::Playback(e)
    }
}

fn wait_outcome(result: WaitResult) -> StepOutcome {
    if result.matched {
        StepOutcome::Done
    } else {
        StepOutcome::TimedOut(result.elapsed_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::HelperServer;
    use crate::platform::{MockAction, MockDesktop};
    use crate::scenario::InMemoryStore;
    use mk_protocol::config_models::HelperSettings;
    use mk_protocol::geometry::{Point, Rect, Rgb};
    use mk_protocol::scenario_models::{MouseButton, Scenario};
    use std::collections::BTreeSet;
    use tokio::sync::mpsc;

    struct Harness {
        mock: Arc<MockDesktop>,
        store: Arc<InMemoryStore>,
        engine: PlaybackEngine,
    }

    fn harness() -> Harness {
        let mock = Arc::new(MockDesktop::default());
        let server = HelperServer::new(mock.clone(), HelperSettings::default());
        let (client, _server_task) = HelperClient::in_process(server);
        let store = Arc::new(InMemoryStore::new());
        let engine = PlaybackEngine::new(Arc::new(client), store.clone()).with_wait_timeout(200);
        Harness {
            mock,
            store,
            engine,
        }
    }

    async fn collect(mut rx: mpsc::Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn click(x: i32, y: i32) -> Step {
        Step::Click {
            position: Point::new(x, y),
            button: MouseButton::Left,
        }
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let h = harness();
        let mut scenario = Scenario::new("login");
        scenario.push_step(click(100, 400));
        scenario.push_step(Step::Delay { ms: 5 });
        scenario.push_step(Step::Keypress {
            key: "enter".to_string(),
            modifiers: BTreeSet::new(),
        });
        let id = scenario.id;
        h.store.import(scenario).await.unwrap();

        let (tx, rx) = mpsc::channel(64);
        let outcome = h.engine.run(id, tx).await.unwrap();
        assert_eq!(outcome, PlaybackOutcome::Completed);

        assert_eq!(
            h.mock.actions(),
            vec![
                MockAction::Click {
                    position: Point::new(100, 400),
                    button: MouseButton::Left,
                },
                MockAction::Keypress {
                    key: "enter".to_string(),
                    modifiers: BTreeSet::new(),
                },
            ]
        );

        let events = collect(rx).await;
        assert!(matches!(events.first(), Some(PlaybackEvent::Started { depth: 0, .. })));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, PlaybackEvent::StepCompleted { .. }))
                .count(),
            3
        );
        assert!(matches!(
            events.last(),
            Some(PlaybackEvent::Finished {
                outcome: PlaybackOutcome::Completed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_unmatched_wait_is_timed_out_not_error() {
        let h = harness();
        h.mock.set_background(Rgb::new(0, 0, 0));

        let mut scenario = Scenario::new("wait");
        scenario.push_step(Step::PixelZone {
            rect: Rect::new(0, 0, 4, 4),
            color: Rgb::new(255, 255, 255),
            threshold: 10.0,
        });
        scenario.push_step(click(1, 1));
        let id = scenario.id;
        h.store.import(scenario).await.unwrap();

        let (tx, rx) = mpsc::channel(64);
        let outcome = h.engine.run(id, tx).await.unwrap();

        match outcome {
            PlaybackOutcome::WaitTimedOut {
                scenario_id,
                step_index,
                elapsed_ms,
            } => {
                assert_eq!(scenario_id, id);
                assert_eq!(step_index, 0);
                assert!(elapsed_ms >= 200);
            }
            other => panic!("Expected timeout, got {other:?}"),
        }
        assert!(h.mock.actions().is_empty());

        let events = collect(rx).await;
        assert!(events
            .iter()
            .any(|e| matches!(e, PlaybackEvent::WaitTimedOut { index: 0, .. })));
    }

    #[tokio::test]
    async fn test_nested_scenario_is_played_in_place() {
        let h = harness();
        let mut inner = Scenario::new("inner");
        inner.push_step(click(2, 2));
        let mut outer = Scenario::new("outer");
        outer.push_step(click(1, 1));
        outer.push_step(Step::ScenarioRef {
            scenario_id: inner.id,
        });
        outer.push_step(click(3, 3));
        let (outer_id, inner_before) = (outer.id, inner.last_used_at);
        let inner_id = inner.id;
        h.store.import(inner).await.unwrap();
        h.store.import(outer).await.unwrap();

        let (tx, rx) = mpsc::channel(64);
        h.engine.run(outer_id, tx).await.unwrap();

        let positions: Vec<_> = h
            .mock
            .actions()
            .into_iter()
            .filter_map(|a| match a {
                MockAction::Click { position, .. } => Some(position.x),
                _ => None,
            })
            .collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert!(h.store.get(inner_id).await.unwrap().last_used_at >= inner_before);

        let events = collect(rx).await;
        assert!(events
            .iter()
            .any(|e| matches!(e, PlaybackEvent::Started { depth: 1, .. })));
    }

    #[tokio::test]
    async fn test_reference_cycle_is_rejected() {
        let h = harness();
        let mut a = Scenario::new("a");
        let mut b = Scenario::new("b");
        a.push_step(Step::ScenarioRef { scenario_id: b.id });
        b.push_step(Step::ScenarioRef { scenario_id: a.id });
        let a_id = a.id;
        h.store.import(a).await.unwrap();
        h.store.import(b).await.unwrap();

        let (tx, rx) = mpsc::channel(64);
        let err = h.engine.run(a_id, tx).await.unwrap_err();
        assert!(matches!(err, PlaybackError::Cycle(id) if id == a_id));

        let events = collect(rx).await;
        assert!(matches!(events.last(), Some(PlaybackEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn test_rejected_step_reports_its_index() {
        let h = harness();
        let mut scenario = Scenario::new("bad key");
        scenario.push_step(click(1, 1));
        scenario.push_step(Step::Keypress {
            key: "hyper".to_string(),
            modifiers: BTreeSet::new(),
        });
        let id = scenario.id;
        h.store.import(scenario).await.unwrap();

        let (tx, _rx) = mpsc::channel(64);
        match h.engine.run(id, tx).await {
            Err(PlaybackError::Step {
                index,
                source: ClientError::Remote(error),
                ..
            }) => {
                assert_eq!(index, 1);
                assert!(error.starts_with("ActionError:"));
            }
            other => panic!("Expected step failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_scenario() {
        let h = harness();
        let id = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(8);
        assert!(matches!(
            h.engine.run(id, tx).await,
            Err(PlaybackError::Store(StoreError::NotFound(missing))) if missing == id
        ));
    }
}
