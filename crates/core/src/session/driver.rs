//! Recorder driver.
//!
//! Pumps helper events into a [`RecordingSession`], sends the requests the
//! session asks for, and saves the captured steps when recording ends.

use crate::client::{ClientError, HelperClient};
use crate::scenario::{ScenarioStore, StoreError};
use crate::session::RecordingSession;
use mk_protocol::config_models::RecorderSettings;
use mk_protocol::ipc::{Command, HelperEvent};
use mk_protocol::scenario_models::Scenario;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Helper request failed: {0}")]
    Client(#[from] ClientError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Instructions from the user while a recording runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderControl {
    /// Append a fixed delay step.
    Delay(u64),
    /// Append a reference to another scenario.
    ScenarioRef(Uuid),
    /// Finish the recording.
    Stop,
}

/// Why a recording ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Requested,
    OverlayClosed,
    HelperGone,
    RequestFailed,
}

impl StopReason {
    fn after_failed(err: &ClientError) -> Self {
        match err {
            ClientError::Disconnected => StopReason::HelperGone,
            _ => StopReason::RequestFailed,
        }
    }
}

pub struct Recorder {
    client: Arc<HelperClient>,
    store: Arc<dyn ScenarioStore>,
    session: RecordingSession,
}

impl Recorder {
    /// Create a recorder.
    ///
    /// # Arguments
    ///
    /// * `client` - Connection to a running helper
    /// * `store` - Where captured steps are saved
    /// * `settings` - Threshold and overlay position for new steps
    pub fn new(
        client: Arc<HelperClient>,
        store: Arc<dyn ScenarioStore>,
        settings: RecorderSettings,
    ) -> Self {
        Self {
            client,
            store,
            session: RecordingSession::new(settings),
        }
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    /// Record into `scenario_id` until the overlay is closed, a
    /// [`RecorderControl::Stop`] arrives, the control channel closes or the
    /// helper goes away. The captured steps are appended to the scenario,
    /// including when a helper request fails mid-recording.
    ///
    /// # Returns
    ///
    /// The updated scenario as stored.
    ///
    /// # Errors
    ///
    /// Fails if the scenario does not exist, if the helper rejects the
    /// requests that start the recording, or if the steps cannot be saved.
    pub async fn record(
        &mut self,
        scenario_id: Uuid,
        events: &mut mpsc::UnboundedReceiver<HelperEvent>,
        mut controls: mpsc::Receiver<RecorderControl>,
    ) -> Result<Scenario, RecordError> {
        let scenario = self.store.get(scenario_id).await?;
        info!(scenario = %scenario.name, "Recording into scenario");

        let commands = self.session.start();
        if let Err(e) = self.send_all(commands).await {
            self.session.stop();
            if !matches!(e, ClientError::Disconnected) {
                self.reset_helper().await;
            }
            return Err(e.into());
        }

        let reason = loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        warn!("Helper event stream ended during recording");
                        break StopReason::HelperGone;
                    };
                    debug!(event = event.name(), "Helper event");
                    let closed = matches!(event, HelperEvent::OverlayClosed);
                    let commands = self.session.handle_event(&event);
                    if let Err(e) = self.send_all(commands).await {
                        warn!("Helper request failed during recording: {e}");
                        break StopReason::after_failed(&e);
                    }
                    if closed {
                        break StopReason::OverlayClosed;
                    }
                }
                control = controls.recv() => match control {
                    Some(RecorderControl::Delay(ms)) => {
                        self.session.record_delay(ms);
                    }
                    Some(RecorderControl::ScenarioRef(id)) => {
                        self.session.record_scenario_ref(id);
                    }
                    Some(RecorderControl::Stop) | None => break StopReason::Requested,
                },
            }
        };

        let steps = self.session.stop();
        info!(?reason, steps = steps.len(), "Recording finished");

        if reason != StopReason::HelperGone {
            self.reset_helper().await;
        }

        Ok(self.store.append_steps(scenario_id, steps).await?)
    }

    /// Return the helper to idle with overlay and magnifier hidden.
    async fn reset_helper(&mut self) {
        let commands = self.session.shutdown_commands();
        if let Err(e) = self.send_all(commands).await {
            warn!("Failed to reset helper after recording: {e}");
        }
    }

    async fn send_all(&self, commands: Vec<Command>) -> Result<(), ClientError> {
        for command in commands {
            self.client.request(command).await?;
        }
        Ok(())
    }
}
