//! Infrastructure layer for Parley.
//!
//! Contains implementations of the traits defined in `parley-core`: the HTTP
//! model client, the file-backed checkpoint store, the host memory probe and
//! the configuration loader.

pub mod codec;
pub mod config;
pub mod file_store;
pub mod memory_probe;
pub mod model;
