//! Configuration loading and management.
//!
//! This module loads settings and scenario files from the `.macro-kit/`
//! directory and resolves which program to launch as the helper.

pub mod error;
pub mod loader;
pub mod models;
pub mod resolve;
