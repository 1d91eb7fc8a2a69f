//! # mk-core
//!
//! Helper executor and orchestrator logic for macro-kit.
//!
//! This crate provides:
//! - The helper: a line-delimited JSON server that synthesizes input,
//!   samples pixels and reports live input as events
//! - A client that drives a helper subprocess
//! - Recording sessions that turn helper events into scenario steps
//! - A playback engine that replays stored scenarios
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from `.macro-kit/`
//! - [`platform`]: Desktop access (native, mock and unsupported)
//! - [`helper`]: The helper server and its request handlers
//! - [`client`]: Orchestrator-side helper connection
//! - [`scenario`]: Scenario store
//! - [`session`]: Recording session and recorder driver
//! - [`engine`]: Scenario playback engine

pub mod client;
pub mod config;
pub mod engine;
pub mod helper;
pub mod platform;
pub mod scenario;
pub mod session;
