//! Core types for runway: backend definitions, chat payloads, the backend
//! adapter port, the error taxonomy and layered runner configuration.
//!
//! This crate has no HTTP client and spawns no processes; those live in
//! `runway-runtime`.

pub mod config;
pub mod domain;
pub mod paths;
pub mod ports;

pub use config::{
    ConfigError, ConfigLayer, ConfigSource, ConfigurationResolver, DEFAULT_RUNNER_NAME, EnvVars,
    FileConfig, ResolvedConfig, RunnerEntry,
};
pub use domain::{
    BackendDefinition, BackendKind, ChatChoice, ChatMessage, ChatRequest, ChatResponse,
    LaunchSpec, RegistryEvent, RegistryStatus, RunnerDescriptor, SamplingParams, Usage,
};
pub use paths::PathError;
pub use ports::{
    AdapterBuildError, BackendAdapter, BackendError, OutputLine, OutputStream, ProcessError,
    ProcessState, RegistryError,
};
