//! HTTP client for a remote model server.

pub mod remote;
pub mod types;

pub use remote::RemoteModel;
