//! Errors raised while handling a helper request.
//!
//! The `Display` form of each variant is sent verbatim as the `error`
//! string of the Response, so it starts with the failure class.

use crate::platform::PlatformError;
use mk_protocol::codec::DecodeError;
use mk_protocol::ipc::CommandError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HelperError {
    /// A request line whose id was readable but whose body was not.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("UnknownMethod: {0}")]
    UnknownMethod(String),

    #[error("InvalidParams: {method}: {reason}")]
    InvalidParams { method: String, reason: String },

    /// OS input synthesis failed.
    #[error("ActionError: {0}")]
    Action(String),

    /// Screen sampling was denied or failed.
    #[error("CaptureError: {0}")]
    Capture(String),

    /// A position or zone lies outside every display.
    #[error("OutOfBounds: {0}")]
    OutOfBounds(String),
}

impl From<CommandError> for HelperError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::UnknownMethod(method) => HelperError::UnknownMethod(method),
            CommandError::InvalidParams { method, reason } => {
                HelperError::InvalidParams { method, reason }
            }
        }
    }
}

impl From<PlatformError> for HelperError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Action(reason) | PlatformError::Listen(reason) => {
                HelperError::Action(reason)
            }
            PlatformError::Capture(reason) => HelperError::Capture(reason),
        }
    }
}
