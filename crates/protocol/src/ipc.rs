//! Inter-process communication protocol.
//!
//! This module defines the messages exchanged between the orchestrator
//! (which owns scenarios and user intent) and the helper (which owns OS
//! input injection and screen sampling).
//!
//! Three message shapes travel over the wire, one JSON object per line:
//! - `Request`: orchestrator to helper, `{"id","method","params"}`
//! - `Response`: helper to orchestrator, exactly one per request id
//! - `EventMessage`: helper to orchestrator, unsolicited, no id
//!
//! The envelopes keep `method`/`params` and `event`/`data` loosely typed so
//! that a correlated error can be produced even when a payload does not
//! match its method. [`Command`] and [`HelperEvent`] are the typed views.

use crate::geometry::{Point, Rect, Rgb};
use crate::recorder_models::{OverlayIcon, RecorderMode};
use crate::scenario_models::{Modifier, MouseButton};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

/// Default budget for `waitForPixelState` / `waitForPixelZone`.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Default delay between two checks of a pixel wait.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// A request from the orchestrator.
///
/// `params` is omitted entirely for zero-argument methods:
/// ```json
/// {"id":"7f1c","method":"hideMagnifier"}
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Request {
    /// Opaque correlation id chosen by the orchestrator.
    pub id: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Result of handling one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// `None` is a void success: the `result` key is left out.
    Success(Option<Value>),
    Failure(String),
}

/// A response to exactly one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: String,
    pub outcome: Outcome,
}

impl Response {
    /// Successful response. A `null` result is treated as void.
    pub fn success(id: impl Into<String>, result: Option<Value>) -> Self {
        let result = result.filter(|value| !value.is_null());
        Self {
            id: id.into(),
            outcome: Outcome::Success(result),
        }
    }

    pub fn failure(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outcome: Outcome::Failure(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }
}

/// Flat wire shape of a response.
#[derive(Serialize, Deserialize)]
pub(crate) struct WireResponse {
    pub id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Serialize for Response {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match &self.outcome {
            Outcome::Success(result) => WireResponse {
                id: self.id.clone(),
                success: true,
                result: result.clone(),
                error: None,
            },
            Outcome::Failure(error) => WireResponse {
                id: self.id.clone(),
                success: false,
                result: None,
                error: Some(error.clone()),
            },
        };
        wire.serialize(serializer)
    }
}

/// An unsolicited event from the helper.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EventMessage {
    pub event: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

/// Any message that can appear on a protocol line.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
    Event(EventMessage),
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Message::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Message::Response(response)
    }
}

impl From<EventMessage> for Message {
    fn from(event: EventMessage) -> Self {
        Message::Event(event)
    }
}

// ---------------------------------------------------------------------------
// Typed request parameters and results
// ---------------------------------------------------------------------------

/// Parameters of `showRecorderOverlay`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShowOverlayParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
}

/// Parameters of `executeClick`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickParams {
    pub position: Point,
    pub button: MouseButton,
}

/// Parameters of `executeKeypress`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KeypressParams {
    pub key: String,
    #[serde(default)]
    pub modifiers: BTreeSet<Modifier>,
}

/// Parameters of `getPixelColor`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelColorParams {
    pub position: Point,
}

/// Parameters of `waitForPixelState`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WaitPixelStateParams {
    pub position: Point,
    pub color: Rgb,
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Parameters of `waitForPixelZone`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WaitPixelZoneParams {
    pub rect: Rect,
    pub color: Rgb,
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Result of `checkPermissions`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    /// Input synthesis and global input listening are allowed.
    pub accessibility: bool,
    /// Screen pixels can be read.
    pub screen_capture: bool,
    /// Caveat about how the flags were determined, when one applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Result of `getPixelColor`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelColorResult {
    pub color: Rgb,
}

/// Result of a pixel wait. A timeout is `matched: false`, not an error.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WaitResult {
    pub matched: bool,
    pub elapsed_ms: u64,
}

/// Errors turning a request envelope into a [`Command`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("UnknownMethod: {0}")]
    UnknownMethod(String),

    #[error("InvalidParams: {method}: {reason}")]
    InvalidParams { method: String, reason: String },
}

/// Typed view of every method the helper understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CheckPermissions,
    ShowRecorderOverlay(ShowOverlayParams),
    HideRecorderOverlay,
    SetRecorderState(RecorderMode),
    ShowMagnifier,
    HideMagnifier,
    ExecuteClick(ClickParams),
    ExecuteKeypress(KeypressParams),
    GetPixelColor(PixelColorParams),
    WaitForPixelState(WaitPixelStateParams),
    WaitForPixelZone(WaitPixelZoneParams),
}

impl Command {
    /// Wire name of the method.
    pub fn method(&self) -> &'static str {
        match self {
            Command::CheckPermissions => "checkPermissions",
            Command::ShowRecorderOverlay(_) => "showRecorderOverlay",
            Command::HideRecorderOverlay => "hideRecorderOverlay",
            Command::SetRecorderState(_) => "setRecorderState",
            Command::ShowMagnifier => "showMagnifier",
            Command::HideMagnifier => "hideMagnifier",
            Command::ExecuteClick(_) => "executeClick",
            Command::ExecuteKeypress(_) => "executeKeypress",
            Command::GetPixelColor(_) => "getPixelColor",
            Command::WaitForPixelState(_) => "waitForPixelState",
            Command::WaitForPixelZone(_) => "waitForPixelZone",
        }
    }

    /// Parameters as sent on the wire, `None` for zero-argument methods.
    pub fn params(&self) -> Result<Option<Value>, serde_json::Error> {
        let value = match self {
            Command::CheckPermissions
            | Command::HideRecorderOverlay
            | Command::ShowMagnifier
            | Command::HideMagnifier => return Ok(None),
            Command::ShowRecorderOverlay(params) => {
                if params.position.is_none() {
                    return Ok(None);
                }
                serde_json::to_value(params)?
            }
            Command::SetRecorderState(mode) => serde_json::to_value(mode)?,
            Command::ExecuteClick(params) => serde_json::to_value(params)?,
            Command::ExecuteKeypress(params) => serde_json::to_value(params)?,
            Command::GetPixelColor(params) => serde_json::to_value(params)?,
            Command::WaitForPixelState(params) => serde_json::to_value(params)?,
            Command::WaitForPixelZone(params) => serde_json::to_value(params)?,
        };
        Ok(Some(value))
    }

    /// Wrap the command in a request envelope with the given id.
    pub fn into_request(self, id: impl Into<String>) -> Result<Request, serde_json::Error> {
        Ok(Request {
            id: id.into(),
            method: self.method().to_string(),
            params: self.params()?,
        })
    }

    /// Decode a method name and its parameters.
    ///
    /// The method is matched first; only then are the parameters decoded
    /// against that method's shape.
    pub fn parse(method: &str, params: Option<Value>) -> Result<Self, CommandError> {
        let command = match method {
            "checkPermissions" => Command::CheckPermissions,
            "showRecorderOverlay" => Command::ShowRecorderOverlay(decode_params(method, params)?),
            "hideRecorderOverlay" => Command::HideRecorderOverlay,
            "setRecorderState" => Command::SetRecorderState(decode_params(method, params)?),
            "showMagnifier" => Command::ShowMagnifier,
            "hideMagnifier" => Command::HideMagnifier,
            "executeClick" => Command::ExecuteClick(decode_params(method, params)?),
            "executeKeypress" => Command::ExecuteKeypress(decode_params(method, params)?),
            "getPixelColor" => Command::GetPixelColor(decode_params(method, params)?),
            "waitForPixelState" => Command::WaitForPixelState(decode_params(method, params)?),
            "waitForPixelZone" => Command::WaitForPixelZone(decode_params(method, params)?),
            other => return Err(CommandError::UnknownMethod(other.to_string())),
        };
        Ok(command)
    }
}

impl TryFrom<&Request> for Command {
    type Error = CommandError;

    fn try_from(request: &Request) -> Result<Self, Self::Error> {
        Command::parse(&request.method, request.params.clone())
    }
}

fn decode_params<T: DeserializeOwned>(method: &str, params: Option<Value>) -> Result<T, CommandError> {
    let value = match params {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(value) => value,
    };
    serde_json::from_value(value).map_err(|e| CommandError::InvalidParams {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Typed events
// ---------------------------------------------------------------------------

/// Events sent from the helper to the orchestrator.
///
/// Uses adjacent tagging to match the event envelope:
/// ```json
/// {"event":"mouseClicked","data":{"position":{"x":1,"y":2},"button":"left"}}
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum HelperEvent {
    /// A mouse button was pressed while clicks are being captured.
    MouseClicked { position: Point, button: MouseButton },

    /// A key was pressed while keys are being captured.
    KeyPressed {
        key: String,
        #[serde(default)]
        modifiers: BTreeSet<Modifier>,
    },

    /// The user dragged out a zone on the overlay.
    ZoneSelected { rect: Rect },

    /// The user picked a pixel with the magnifier.
    PixelSelected { position: Point, color: Rgb },

    /// One of the overlay icons was clicked.
    OverlayIconClicked { icon: OverlayIcon },

    /// The user closed the overlay.
    OverlayClosed,
}

impl HelperEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            HelperEvent::MouseClicked { .. } => "mouseClicked",
            HelperEvent::KeyPressed { .. } => "keyPressed",
            HelperEvent::ZoneSelected { .. } => "zoneSelected",
            HelperEvent::PixelSelected { .. } => "pixelSelected",
            HelperEvent::OverlayIconClicked { .. } => "overlayIconClicked",
            HelperEvent::OverlayClosed => "overlayClosed",
        }
    }

    /// Convert into the loosely typed envelope.
    pub fn to_message(&self) -> Result<EventMessage, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        let data = value
            .as_object_mut()
            .and_then(|object| object.remove("data"))
            .unwrap_or(Value::Null);
        Ok(EventMessage {
            event: self.name().to_string(),
            data,
        })
    }
}

impl TryFrom<&EventMessage> for HelperEvent {
    type Error = serde_json::Error;

    fn try_from(message: &EventMessage) -> Result<Self, Self::Error> {
        let mut object = Map::new();
        object.insert("event".to_string(), Value::String(message.event.clone()));
        if !message.data.is_null() {
            object.insert("data".to_string(), message.data.clone());
        }
        serde_json::from_value(Value::Object(object))
    }
}
