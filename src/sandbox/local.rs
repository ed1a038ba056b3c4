//! Local process sandbox backend.
//!
//! Allocates a temp directory as the sandbox's `/ptc` root and runs the
//! entry program as a real child process: piped stdin/stdout/stderr,
//! `BufReader` line streaming, generalized here from a single
//! request/response exchange to a continuous stream of sentinel lines.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, Mutex};

use super::{KillHandle, RunningProcess, SandboxHandle, SandboxProvider};
use crate::error::PtcError;

/// How to invoke an assembled sandbox program. `{main}` in `args` is
/// replaced with the absolute path to the handle's `main.<ext>` file.
#[derive(Debug, Clone)]
pub struct Runner {
    pub program: String,
    pub args: Vec<String>,
    pub ext: &'static str,
}

impl Runner {
    pub fn new(program: impl Into<String>, args: Vec<String>, ext: &'static str) -> Self {
        Self { program: program.into(), args, ext }
    }

    /// A Deno invocation suitable for running the TypeScript files this
    /// crate's assembler emits.
    pub fn deno() -> Self {
        Self::new("deno", vec!["run".to_string(), "--allow-read".to_string(), "--allow-write".to_string(), "{main}".to_string()], "ts")
    }

    /// Plain Node for the JavaScript emission path.
    pub fn node() -> Self {
        Self::new("node", vec!["{main}".to_string()], "js")
    }
}

pub struct LocalProcessProvider {
    runner: Runner,
}

impl LocalProcessProvider {
    pub fn new(runner: Runner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl SandboxProvider for LocalProcessProvider {
    async fn create(&self, execution_id: &str) -> Result<Arc<dyn SandboxHandle>, PtcError> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("ptc-{execution_id}-"))
            .tempdir()
            .map_err(|e| PtcError::Sandbox(format!("failed to provision sandbox directory: {e}")))?;

        tokio::fs::create_dir_all(dir.path().join("requests"))
            .await
            .map_err(|e| PtcError::Sandbox(format!("failed to create requests dir: {e}")))?;
        tokio::fs::create_dir_all(dir.path().join("responses"))
            .await
            .map_err(|e| PtcError::Sandbox(format!("failed to create responses dir: {e}")))?;

        Ok(Arc::new(LocalSandboxHandle {
            root: Mutex::new(Some(dir)),
            runner: self.runner.clone(),
        }))
    }
}

pub struct LocalSandboxHandle {
    root: Mutex<Option<tempfile::TempDir>>,
    runner: Runner,
}

impl LocalSandboxHandle {
    async fn root_path(&self) -> Result<PathBuf, PtcError> {
        let guard = self.root.lock().await;
        match guard.as_ref() {
            Some(dir) => Ok(dir.path().to_path_buf()),
            None => Err(PtcError::Sandbox("sandbox already destroyed".to_string())),
        }
    }

    fn resolve(root: &Path, relative: &str) -> PathBuf {
        root.join(relative.trim_start_matches('/'))
    }
}

#[async_trait]
impl SandboxHandle for LocalSandboxHandle {
    async fn write_file(&self, path: &str, content: &str) -> Result<(), PtcError> {
        let root = self.root_path().await?;
        let full = Self::resolve(&root, path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PtcError::Sandbox(format!("failed to create parent dir for {path}: {e}")))?;
        }
        tokio::fs::write(&full, content).await.map_err(|e| PtcError::Sandbox(format!("failed to write {path}: {e}")))
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>, PtcError> {
        let root = self.root_path().await?;
        let full = Self::resolve(&root, path);
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PtcError::Sandbox(format!("failed to read {path}: {e}"))),
        }
    }

    async fn run(&self) -> Result<RunningProcess, PtcError> {
        let root = self.root_path().await?;
        let main_path = root.join(format!("main.{}", self.runner.ext));
        let main_path_str = main_path.to_string_lossy().to_string();

        let args: Vec<String> =
            self.runner.args.iter().map(|a| if a == "{main}" { main_path_str.clone() } else { a.clone() }).collect();

        let mut child = Command::new(&self.runner.program)
            .args(&args)
            .current_dir(&root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PtcError::Sandbox(format!("failed to spawn sandbox runner {}: {e}", self.runner.program)))?;

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if stdout_tx.send(line).is_err() {
                    break;
                }
            }
        });

        let stderr_buffer = Arc::new(Mutex::new(String::new()));
        {
            let stderr_buffer = stderr_buffer.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let mut buf = stderr_buffer.lock().await;
                    buf.push_str(&line);
                    buf.push('\n');
                }
            });
        }

        let child = Arc::new(Mutex::new(child));
        let (exit_tx, exit_rx) = oneshot::channel();
        {
            let child = child.clone();
            tokio::spawn(async move {
                let status = child.lock().await.wait().await;
                let _ = exit_tx.send(status);
            });
        }

        Ok(RunningProcess::new(stdout_rx, stderr_buffer, exit_rx, Arc::new(ChildKillHandle { child })))
    }

    async fn destroy(&self) {
        let mut guard = self.root.lock().await;
        // Dropping the TempDir removes the directory tree; taking it out
        // makes destruction immediate and idempotent even if other `Arc`
        // clones of this handle are still alive.
        *guard = None;
    }
}

struct ChildKillHandle {
    child: Arc<Mutex<tokio::process::Child>>,
}

#[async_trait]
impl KillHandle for ChildKillHandle {
    async fn kill(&self) {
        let mut child = self.child.lock().await;
        let _ = child.start_kill();
    }
}
