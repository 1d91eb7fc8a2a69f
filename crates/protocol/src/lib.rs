//! # mk-protocol
//!
//! Core protocol definitions and data models for macro-kit.
//!
//! This crate defines all shared data structures used for:
//! - Scenario and step definitions recorded by the orchestrator
//! - The recorder mode shared between orchestrator and helper
//! - The line-delimited JSON protocol spoken between the two processes
//!
//! ## Modules
//!
//! - [`geometry`]: Points, rectangles and RGB colors
//! - [`scenario_models`]: Scenarios and their steps
//! - [`recorder_models`]: Recorder mode and overlay icons
//! - [`ipc`]: Requests, Responses, Events and their typed payloads
//! - [`codec`]: Encoding and decoding of single protocol lines
//! - [`config_models`]: Settings from `.macro-kit/config.toml`
//! - [`playback_models`]: Progress events reported during playback
//!
//! ## Design Principles
//!
//! - Minimal dependencies: serde, thiserror, uuid and chrono
//! - Independent compilation: No dependencies on other macro-kit crates

pub mod codec;
pub mod config_models;
pub mod geometry;
pub mod ipc;
pub mod playback_models;
pub mod recorder_models;
pub mod scenario_models;

// Re-export all public types for convenience
pub use codec::*;
pub use config_models::*;
pub use geometry::*;
pub use ipc::*;
pub use playback_models::*;
pub use recorder_models::*;
pub use scenario_models::*;
