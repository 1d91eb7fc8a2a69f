//! Shared test utilities for the helper and orchestrator integration tests.
//!
//! - Fixtures that run a helper in-process against a [`MockDesktop`]
//! - Assertions over playback events and raw helper output
//!
//! [`MockDesktop`]: mk_core::platform::MockDesktop

pub mod assertions;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
pub use fixtures::*;
