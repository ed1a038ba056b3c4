//! Sandbox Providers
//!
//! The sandbox provider is treated as an external collaborator: create an
//! ephemeral environment, read/write files into it, spawn a command with
//! streamed stdout/stderr, kill. This module defines that contract as
//! `SandboxProvider`/`SandboxHandle`, async and object-safe via
//! `async_trait` the same way the rest of this crate's seams are, and the
//! `local` submodule ships the one concrete backend this crate implements.

pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::error::PtcError;

#[async_trait]
pub trait SandboxProvider: Send + Sync {
    async fn create(&self, execution_id: &str) -> Result<Arc<dyn SandboxHandle>, PtcError>;
}

#[async_trait]
pub trait SandboxHandle: Send + Sync {
    async fn write_file(&self, path: &str, content: &str) -> Result<(), PtcError>;
    async fn read_file(&self, path: &str) -> Result<Option<String>, PtcError>;

    /// Launch the sandbox's entry program. Each handle knows, from how it
    /// was provisioned, what command runs its own `main.<ext>`.
    async fn run(&self) -> Result<RunningProcess, PtcError>;

    /// Destroy the sandbox. Best-effort; failures are logged by the caller
    /// and never change an execution's outcome.
    async fn destroy(&self);
}

/// A backgrounded command, matching a `commands.run(...) -> Command`
/// style contract: line-oriented stdout, an accumulating stderr buffer, a
/// completion signal, and a kill switch.
pub struct RunningProcess {
    pub stdout_lines: mpsc::UnboundedReceiver<String>,
    pub stderr: Arc<Mutex<String>>,
    pub exit: oneshot::Receiver<std::io::Result<std::process::ExitStatus>>,
    kill_handle: Arc<dyn KillHandle>,
}

impl RunningProcess {
    pub fn new(
        stdout_lines: mpsc::UnboundedReceiver<String>,
        stderr: Arc<Mutex<String>>,
        exit: oneshot::Receiver<std::io::Result<std::process::ExitStatus>>,
        kill_handle: Arc<dyn KillHandle>,
    ) -> Self {
        Self { stdout_lines, stderr, exit, kill_handle }
    }

    pub async fn kill(&self) {
        self.kill_handle.kill().await;
    }
}

#[async_trait]
pub trait KillHandle: Send + Sync {
    async fn kill(&self);
}
