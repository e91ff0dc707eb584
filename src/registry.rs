// src/registry.rs

//! Process registry and shutdown coordinator.
//!
//! Every [`ManagedProcess`] is registered in exactly one [`ProcessRegistry`]
//! when it is constructed. Entries are never removed: terminal processes are
//! simply skipped by [`ProcessRegistry::live`] and by shutdown.
//!
//! Registries are plain values, so tests and embedders can create their own.
//! [`global`] is the process-wide instance used by
//! [`ManagedProcess::spawn`] and [`quit_all_child_processes`].

use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::SupervisorConfig;
use crate::errors::Result;
use crate::process::{ManagedProcess, ProcessOptions};
use crate::types::Signal;

static GLOBAL: LazyLock<ProcessRegistry> = LazyLock::new(ProcessRegistry::new);

/// The process-wide registry, with default configuration.
pub fn global() -> &'static ProcessRegistry {
    &GLOBAL
}

/// Shut down every live process in the [`global`] registry.
pub async fn quit_all_child_processes() -> ShutdownReport {
    global().quit_all_child_processes().await
}

/// Outcome of [`ProcessRegistry::quit_all_child_processes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Live processes that were sent the shutdown signal.
    pub signalled: usize,
    /// Of those, how many confirmed their exit in time.
    pub exited: usize,
    /// Of those, how many did not confirm within the exit timeout.
    pub timed_out: usize,
}

/// Append-only list of managed processes plus the configuration applied to
/// processes spawned through it.
#[derive(Debug, Clone)]
pub struct ProcessRegistry {
    entries: Arc<Mutex<Vec<ManagedProcess>>>,
    config: Arc<SupervisorConfig>,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::with_config(SupervisorConfig::default())
    }

    pub fn with_config(config: SupervisorConfig) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Spawn a managed process registered here. See [`ManagedProcess::spawn`].
    pub fn spawn<I, S>(
        &self,
        command: impl Into<String>,
        args: I,
        options: ProcessOptions,
    ) -> Result<ManagedProcess>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = args.into_iter().map(Into::into).collect();
        ManagedProcess::new_in(self, command.into(), args, options)
    }

    /// Add a process. Called by construction; entries are never removed.
    pub(crate) fn register(&self, process: ManagedProcess) {
        let mut entries = self.entries();
        debug!(
            cmd = %process.command_line(),
            registered = entries.len() + 1,
            "registering process"
        );
        entries.push(process);
    }

    /// Number of processes ever registered.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Snapshot of every registered process, in registration order.
    pub fn all(&self) -> Vec<ManagedProcess> {
        self.entries().clone()
    }

    /// Registered processes that have not reached their terminal event.
    pub fn live(&self) -> Vec<ManagedProcess> {
        self.entries()
            .iter()
            .filter(|p| p.is_live())
            .cloned()
            .collect()
    }

    /// Forward a host signal to every live process. Returns how many
    /// deliveries succeeded.
    pub fn forward_signal(&self, signal: Signal) -> usize {
        self.live()
            .iter()
            .filter(|p| p.forward_signal(signal))
            .count()
    }

    /// Force-terminate every live process and wait for them to exit.
    ///
    /// Each live process gets the `[shutdown].signal` (SIGKILL by default).
    /// Waits are settled independently and each is bounded by
    /// `[shutdown].exit_timeout_ms`, so one child that never confirms its
    /// exit cannot block or abort the shutdown of the others.
    pub async fn quit_all_child_processes(&self) -> ShutdownReport {
        let signal = self.config.shutdown.signal;
        let limit = self.config.shutdown.exit_timeout();
        let live = self.live();

        info!(live = live.len(), %signal, "quitting all child processes");

        let mut report = ShutdownReport {
            signalled: live.len(),
            ..ShutdownReport::default()
        };

        let mut waits = JoinSet::new();
        for process in live {
            process.halt(Some(signal));
            waits.spawn(async move {
                let outcome = timeout(limit, process.wait_for_exit()).await;
                (process, outcome)
            });
        }

        while let Some(joined) = waits.join_next().await {
            match joined {
                Ok((process, Ok(exit_code))) => {
                    debug!(
                        cmd = %process.command_line(),
                        exit_code,
                        "child confirmed exit during shutdown"
                    );
                    report.exited += 1;
                }
                Ok((process, Err(_))) => {
                    warn!(
                        pid = process.pid(),
                        cmd = %process.command_line(),
                        timeout_ms = limit.as_millis() as u64,
                        "child did not confirm exit during shutdown"
                    );
                    report.timed_out += 1;
                }
                Err(e) => {
                    warn!(error = %e, "shutdown wait task failed");
                    report.timed_out += 1;
                }
            }
        }

        info!(
            exited = report.exited,
            timed_out = report.timed_out,
            "child process shutdown complete"
        );
        report
    }

    fn entries(&self) -> MutexGuard<'_, Vec<ManagedProcess>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
