//! Orchestration logic and collaborator traits for Parley.
//!
//! This crate defines the "ports" (model, store and transport traits) that the
//! infrastructure layer implements, plus everything that runs between them:
//! budget and placement at startup, the conversational context, replay and
//! the dispatcher. It depends only on `parley-types` -- never on
//! `parley-infra` or any network/filesystem crate.

pub mod budget;
pub mod catalog;
pub mod context;
pub mod dispatcher;
pub mod gate;
pub mod generation;
pub mod model;
pub mod placement;
pub mod prompt;
pub mod queue;
pub mod replay;
pub mod store;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
