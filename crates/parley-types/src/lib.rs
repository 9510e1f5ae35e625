//! Shared domain types for Parley.
//!
//! Events, checkpoints, model boundary values, memory statistics,
//! configuration and the error enums used across the workspace.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod event;
pub mod memory;
pub mod model;
