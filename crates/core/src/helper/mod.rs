//! The automation helper (executor).
//!
//! Owns OS input injection and screen sampling on behalf of the
//! orchestrator. Speaks the line protocol on a pair of byte streams,
//! normally its own stdin and stdout.
//!
//! - [`transport`]: line reading and the ordered write queue
//! - [`router`]: method dispatch and response building
//! - [`recorder`]: the recorder mode cell
//! - [`overlay`]: overlay and magnifier visibility
//! - [`actions`]: click and key press synthesis
//! - [`pixel`]: pixel checks and bounded waits
//! - [`listener`]: raw input to protocol events
//! - [`server`]: the read loop tying everything together

pub mod actions;
pub mod error;
pub mod listener;
pub mod overlay;
pub mod pixel;
pub mod recorder;
pub mod router;
pub mod server;
pub mod transport;

pub use error::HelperError;
pub use server::HelperServer;
