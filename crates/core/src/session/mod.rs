//! Recording session.
//!
//! The orchestrator side of recording. The helper only filters live input
//! by recorder mode; this session decides what that input means, turns it
//! into [`Step`]s, and tells the caller which requests to send back. It
//! does no I/O itself, see [`driver::Recorder`] for the part that talks to
//! a helper.

pub mod driver;

pub use driver::Recorder;

use mk_protocol::config_models::RecorderSettings;
use mk_protocol::geometry::Rect;
use mk_protocol::ipc::{Command, HelperEvent, ShowOverlayParams};
use mk_protocol::recorder_models::{OverlayIcon, RecorderMode, RecorderState, RecorderSubState};
use mk_protocol::scenario_models::Step;
use tracing::{debug, info};
use uuid::Uuid;

/// Local state of one recording.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    settings: RecorderSettings,
    mode: RecorderMode,
    active: bool,
    magnifier: bool,
    pending_zone: Option<Rect>,
    steps: Vec<Step>,
}

impl RecordingSession {
    pub fn new(settings: RecorderSettings) -> Self {
        Self {
            settings,
            mode: RecorderMode::IDLE,
            active: false,
            magnifier: false,
            pending_zone: None,
            steps: Vec::new(),
        }
    }

    /// Begin recording. Clears anything captured by a previous run and
    /// arms click capture.
    pub fn start(&mut self) -> Vec<Command> {
        self.active = true;
        self.magnifier = false;
        self.pending_zone = None;
        self.steps.clear();
        self.mode = RecorderMode::action(RecorderSubState::Mouse);
        info!("Recording started");

        vec![
            Command::ShowRecorderOverlay(ShowOverlayParams {
                position: self.settings.overlay_position,
            }),
            Command::SetRecorderState(self.mode),
        ]
    }

    /// Stop recording and hand back the captured steps.
    ///
    /// Send [`RecordingSession::shutdown_commands`] afterwards to return the
    /// helper to `idle`.
    pub fn stop(&mut self) -> Vec<Step> {
        self.active = false;
        self.pending_zone = None;
        self.mode = RecorderMode::IDLE;
        let steps = std::mem::take(&mut self.steps);
        info!(steps = steps.len(), "Recording stopped");
        steps
    }

    /// Requests that put the helper back to rest after a recording.
    pub fn shutdown_commands(&mut self) -> Vec<Command> {
        self.magnifier = false;
        vec![
            Command::SetRecorderState(RecorderMode::IDLE),
            Command::HideMagnifier,
            Command::HideRecorderOverlay,
        ]
    }

    pub fn mode(&self) -> RecorderMode {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pending_zone(&self) -> Option<Rect> {
        self.pending_zone
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Interpret one helper event.
    ///
    /// Icon clicks always update the local mode. Input is turned into a
    /// step only while the session is active and the mode captures it.
    ///
    /// # Returns
    ///
    /// The requests the caller must send to the helper, in order.
    pub fn handle_event(&mut self, event: &HelperEvent) -> Vec<Command> {
        match event {
            HelperEvent::OverlayIconClicked { icon } => self.route_icon(*icon),
            HelperEvent::MouseClicked { position, button } => {
                if self.active && self.mode.captures_clicks() {
                    self.push(Step::Click {
                        position: *position,
                        button: *button,
                    });
                }
                Vec::new()
            }
            HelperEvent::KeyPressed { key, modifiers } => {
                if self.active && self.mode.captures_keys() {
                    self.push(Step::Keypress {
                        key: key.clone(),
                        modifiers: modifiers.clone(),
                    });
                }
                Vec::new()
            }
            HelperEvent::ZoneSelected { rect } => {
                if self.active {
                    debug!(?rect, "Zone pending");
                    self.pending_zone = Some(*rect);
                }
                Vec::new()
            }
            HelperEvent::PixelSelected { position, color } => {
                if !self.active {
                    return Vec::new();
                }
                let threshold = self.settings.default_threshold;
                let step = match self.pending_zone.take() {
                    Some(rect) => Step::PixelZone {
                        rect,
                        color: *color,
                        threshold,
                    },
                    None => Step::PixelState {
                        position: *position,
                        color: *color,
                        threshold,
                    },
                };
                self.push(step);
                self.magnifier = false;
                vec![Command::HideMagnifier]
            }
            HelperEvent::OverlayClosed => {
                self.pending_zone = None;
                self.magnifier = false;
                self.mode = RecorderMode::IDLE;
                vec![Command::SetRecorderState(RecorderMode::IDLE)]
            }
        }
    }

    /// Record a fixed delay. Ignored unless the session is active.
    pub fn record_delay(&mut self, ms: u64) -> bool {
        self.record(Step::Delay { ms })
    }

    /// Record a reference to another scenario. Ignored unless the session is active.
    pub fn record_scenario_ref(&mut self, scenario_id: Uuid) -> bool {
        self.record(Step::ScenarioRef { scenario_id })
    }

    fn record(&mut self, step: Step) -> bool {
        if !self.active {
            return false;
        }
        self.push(step);
        true
    }

    fn push(&mut self, step: Step) {
        debug!(kind = step.kind(), index = self.steps.len(), "Step recorded");
        self.steps.push(step);
    }

    // The mouse icon means "capture clicks" under action and "pick a
    // pixel" under transition.
    fn route_icon(&mut self, icon: OverlayIcon) -> Vec<Command> {
        let (mode, magnifier) = match icon {
            OverlayIcon::Action => (RecorderMode::action(RecorderSubState::Mouse), false),
            OverlayIcon::Transition => (RecorderMode::transition(RecorderSubState::Pixel), false),
            OverlayIcon::Mouse if self.mode.state == RecorderState::Transition => {
                (RecorderMode::transition(RecorderSubState::Pixel), true)
            }
            OverlayIcon::Mouse => (RecorderMode::action(RecorderSubState::Mouse), false),
            OverlayIcon::Keyboard => (RecorderMode::action(RecorderSubState::Keyboard), false),
            OverlayIcon::Time => (RecorderMode::transition(RecorderSubState::Time), false),
        };
        debug!(?icon, ?mode, "Icon routed");
        self.mode = mode;

        let mut commands = vec![Command::SetRecorderState(mode)];
        if magnifier {
            self.magnifier = true;
            commands.push(Command::ShowMagnifier);
        } else if self.magnifier && !mode.captures_pixels() {
            self.magnifier = false;
            commands.push(Command::HideMagnifier);
        }
        commands
    }
}
