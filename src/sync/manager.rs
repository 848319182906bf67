use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::process::Command;
use tracing::{debug, error};

use super::{worker, SyncMode};

/// Completion state shared between the supervision tasks and the progress
/// loop. `complete` stores the failure flag before decrementing the count,
/// so a reader that has observed zero active workers also observes every
/// failure.
#[derive(Debug, Default)]
pub struct SyncState {
    active: AtomicUsize,
    failed: AtomicBool,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one worker in before it starts.
    pub fn register(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    /// Count one worker out, recording whether it succeeded.
    pub fn complete(&self, ok: bool) {
        if !ok {
            self.failed.store(true, Ordering::SeqCst);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Workers registered but not yet terminated.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether any worker has failed so far.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

/// Resolves once one worker has terminated, to whether it succeeded.
pub type WorkerExit = BoxFuture<'static, bool>;

/// Seam between the manager and the operating system, so tests can swap
/// real worker processes for scripted ones.
pub trait WorkerLauncher: Send + Sync {
    /// Start one worker. `Err` means the worker never started; otherwise
    /// the returned future resolves when it terminates.
    fn spawn(&self, mode: SyncMode, target: Option<&Path>) -> Result<WorkerExit>;
}

/// Launches workers by re-executing the current binary with the internal
/// worker argument vector.
pub struct ProcessLauncher {
    program: PathBuf,
}

impl ProcessLauncher {
    pub fn from_current_exe() -> Result<Self> {
        let program =
            std::env::current_exe().context("can't resolve own executable for sync workers")?;
        Ok(Self { program })
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn spawn(&self, mode: SyncMode, target: Option<&Path>) -> Result<WorkerExit> {
        let mut command = Command::new(&self.program);
        command.env(worker::WORKER_ENV, "1");
        command.arg(worker::SENTINEL).arg("--mode").arg(mode.flag());
        if let Some(target) = target {
            command.arg(target);
        }
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            // A worker abandoned by a timeout must keep flushing.
            .kill_on_drop(false)
            .spawn()
            .with_context(|| match target {
                Some(path) => format!("can't start sync worker for \"{}\"", path.display()),
                None => "can't start whole-system sync worker".to_string(),
            })?;

        if let Some(pid) = child.id() {
            debug!("started sync worker, pid {pid}");
        }

        Ok(async move {
            match child.wait().await {
                Ok(status) => status.success(),
                Err(err) => {
                    error!("can't collect sync worker status: {err}");
                    false
                }
            }
        }
        .boxed())
    }
}

/// Owns the worker fleet for one run: starts one worker per assignment and
/// folds each termination into the shared [`SyncState`].
pub struct SyncManager {
    launcher: Arc<dyn WorkerLauncher>,
    state: Arc<SyncState>,
}

impl SyncManager {
    pub fn new(launcher: Arc<dyn WorkerLauncher>) -> Self {
        Self {
            launcher,
            state: Arc::new(SyncState::new()),
        }
    }

    pub fn state(&self) -> Arc<SyncState> {
        self.state.clone()
    }

    /// Start every worker for the run. An empty target list means a single
    /// whole-system worker.
    pub fn spawn_all(&self, mode: SyncMode, targets: &[PathBuf]) {
        if targets.is_empty() {
            self.spawn_worker(mode, None);
        } else {
            for target in targets {
                self.spawn_worker(mode, Some(target));
            }
        }
    }

    fn spawn_worker(&self, mode: SyncMode, target: Option<&Path>) {
        // Register before the spawn, so a worker that terminates instantly
        // cannot be completed before it is counted.
        self.state.register();
        match self.launcher.spawn(mode, target) {
            Ok(exit) => {
                let state = self.state.clone();
                tokio::spawn(async move {
                    state.complete(exit.await);
                });
            }
            Err(err) => {
                error!("{err:#}");
                self.state.complete(false);
            }
        }
    }
}
