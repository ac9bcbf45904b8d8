//! Backend adapter trait definition.
//!
//! This port defines the capability every runner exposes to the registry.
//! Implementations own all HTTP and process details internally.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::BackendError;
use super::process::{OutputLine, ProcessState};
use crate::domain::{BackendKind, ChatRequest, ChatResponse};

/// In-process proxy for one inference backend.
///
/// The set of implementations is closed: [`BackendAdapter::kind`] tells
/// callers which variant they hold so matches stay exhaustive.
///
/// # Design Rules
///
/// - `health` never errors; any failure is `false`
/// - `chat` never retries and never fails over
/// - Cancellation surfaces as [`BackendError::Cancelled`], not as a health failure
#[async_trait]
pub trait BackendAdapter: Send + Sync + fmt::Debug {
    /// Unique runner name.
    fn name(&self) -> &str;

    fn kind(&self) -> BackendKind;

    /// Base URL requests are sent to.
    fn base_url(&self) -> &str;

    /// Model currently selected on this runner.
    fn current_model(&self) -> Option<String>;

    /// Probe the backend.
    async fn health(&self) -> bool;

    /// Forward a chat request.
    async fn chat(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatResponse, BackendError>;

    /// Make `model` the current model.
    ///
    /// Local backends restart their process with the new model file.
    async fn load_model(&self, model: &str) -> Result<(), BackendError>;

    /// Drop the current model. Returns `false` when nothing was loaded.
    async fn unload(&self) -> Result<bool, BackendError>;

    /// Bring the backend up. Idempotent; a no-op for remote backends.
    async fn start(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Release every resource held by the adapter (stops local processes).
    async fn shutdown(&self) {}

    /// Process state feed, for adapters that own a process.
    fn process_state(&self) -> Option<watch::Receiver<ProcessState>> {
        None
    }

    /// Captured process output, oldest first.
    fn logs(&self) -> Vec<OutputLine> {
        Vec::new()
    }
}
