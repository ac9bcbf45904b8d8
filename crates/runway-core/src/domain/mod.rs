//! Domain types shared by every runway crate.

pub mod backend;
pub mod chat;
pub mod runner;

pub use backend::{BackendDefinition, BackendKind, LOCAL_HOST, LaunchSpec, UnknownBackendKind};
pub use chat::{ChatChoice, ChatMessage, ChatRequest, ChatResponse, SamplingParams, Usage};
pub use runner::{RegistryEvent, RegistryStatus, RunnerDescriptor};
