#![deny(unsafe_code)]
//! Runtime side of runway: backend adapters, local process supervision,
//! health probing and the [`RunnerRegistry`].

pub mod adapters;
pub mod discovery;
pub mod health;
pub mod process;
pub mod registry;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use adapters::{AdapterOptions, LocalAdapter, RemoteAdapter, build_adapter};
pub use process::{ProcessSupervisor, StopPolicy};
pub use registry::{InitReport, RegistryOptions, RunnerRegistry};
