//! HTTP request handlers.
//!
//! Handlers are thin wrappers that delegate to the `RunnerRegistry`.

pub mod chat;
pub mod events;
pub mod health;
pub mod models;
pub mod runners;
