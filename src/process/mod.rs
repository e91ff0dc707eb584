// src/process/mod.rs

//! Managed child processes.
//!
//! A [`ManagedProcess`] wraps one OS child process spawned with
//! `tokio::process::Command`. It owns the child's lifecycle state, its
//! captured (scrubbed) output and an event stream, and offers:
//!
//! - [`ManagedProcess::wait_for_text`] / [`ManagedProcess::wait_for_poll`] /
//!   [`ManagedProcess::wait_for_exit`] to synchronise on the child,
//! - [`ManagedProcess::halt`] to stop it.
//!
//! Construction spawns immediately and registers the process in a
//! [`ProcessRegistry`](crate::registry::ProcessRegistry). Spawn failures do
//! not surface as errors: the process goes straight to its terminal state
//! with exit code [`SPAWN_FAILURE_EXIT_CODE`] and the OS error on stderr.
//!
//! - `capture` starts the child, its pipe readers and its reaper.
//! - `decode` turns raw pipe reads into text chunks.
//! - [`output`] holds the buffers and event types.
//! - `kill` implements halting and signal delivery.
//! - `wait` implements the synchronisation primitives.

mod capture;
mod decode;
mod kill;
pub mod output;
mod wait;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};

use crate::config::WaitsSection;
use crate::errors::{ChildwardenError, Result};
use crate::registry::{self, ProcessRegistry};
use crate::types::Signal;

pub use output::{OutputBuffers, OutputChunk, OutputEvent, Stream};

/// Exit code recorded when the executable could not be started at all.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = -1;

/// Exit code recorded when a process in disconnect mode is halted: it is
/// detached, so its real exit is never observed.
pub const DISCONNECTED_EXIT_CODE: i32 = 0;

const EVENT_CAPACITY: usize = 1024;

/// Per-process options.
///
/// `signal` and `process_group` fall back to the registry's `[process]`
/// configuration when left as `None`.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Working directory for the child. Inherited when `None`.
    pub cwd: Option<PathBuf>,
    /// Environment overrides, applied on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Default signal used by [`ManagedProcess::halt`].
    pub signal: Option<Signal>,
    /// Run the child as the leader of its own process group.
    pub process_group: Option<bool>,
    /// Detach instead of signalling on halt.
    pub disconnect: bool,
    /// Caller metadata carried into logs.
    pub metadata: BTreeMap<String, String>,
}

/// Coarse lifecycle of a managed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Construction has not confirmed a pid yet.
    Spawning,
    /// Pid assigned, not halted.
    Running,
    /// Halted. Absorbing: buffers no longer accept writes.
    Halted,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Status {
    pub(crate) pid: Option<u32>,
    /// Set optimistically by `halt()` and by the terminal event.
    pub(crate) halted: bool,
    /// The OS has reported the exit and released the pid. Signals must not
    /// target the pid any more.
    pub(crate) reaped: bool,
    /// Set exactly once, by the terminal event.
    pub(crate) closed: bool,
    /// Recorded together with `closed`.
    pub(crate) exit_code: Option<i32>,
}

pub(crate) struct Shared {
    command: String,
    args: Vec<String>,
    command_line: String,
    metadata: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
    env: BTreeMap<String, String>,
    signal: Signal,
    process_group: bool,
    disconnect: bool,
    waits: WaitsSection,
    output: Mutex<OutputBuffers>,
    status: watch::Sender<Status>,
    events: broadcast::Sender<OutputEvent>,
    #[cfg(not(unix))]
    kill_requested: tokio::sync::Notify,
}

/// Handle to one supervised child process.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct ManagedProcess {
    shared: Arc<Shared>,
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("command_line", &self.shared.command_line)
            .field("pid", &self.pid())
            .field("state", &self.state())
            .field("exit_code", &self.exit_code())
            .finish_non_exhaustive()
    }
}

impl ManagedProcess {
    /// Spawn `command` with `args`, registered in the process-wide
    /// [`registry::global`] registry.
    ///
    /// Must be called from within a Tokio runtime. Only an empty command is
    /// rejected here; OS spawn failures are reported through the terminal
    /// state instead.
    pub fn spawn<I, S>(command: impl Into<String>, args: I, options: ProcessOptions) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        registry::global().spawn(command, args, options)
    }

    pub(crate) fn new_in(
        registry: &ProcessRegistry,
        command: String,
        args: Vec<String>,
        options: ProcessOptions,
    ) -> Result<Self> {
        if command.trim().is_empty() {
            return Err(ChildwardenError::InvalidCommand(
                "command must not be empty".to_string(),
            ));
        }

        let config = registry.config();
        let command_line = render_command_line(&command, &args);
        let (status, _) = watch::channel(Status::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let process = Self {
            shared: Arc::new(Shared {
                command,
                args,
                command_line,
                metadata: options.metadata,
                cwd: options.cwd,
                env: options.env,
                signal: options.signal.unwrap_or(config.process.default_signal),
                process_group: options
                    .process_group
                    .unwrap_or(config.process.process_group),
                disconnect: options.disconnect,
                waits: config.waits.clone(),
                output: Mutex::new(OutputBuffers::default()),
                status,
                events,
                #[cfg(not(unix))]
                kill_requested: tokio::sync::Notify::new(),
            }),
        };

        registry.register(process.clone());
        process.start();
        Ok(process)
    }

    pub fn command(&self) -> &str {
        &self.shared.command
    }

    pub fn args(&self) -> &[String] {
        &self.shared.args
    }

    /// Command and arguments rendered for logs and error messages.
    pub fn command_line(&self) -> &str {
        &self.shared.command_line
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.shared.metadata
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.shared.cwd.as_deref()
    }

    pub fn default_signal(&self) -> Signal {
        self.shared.signal
    }

    pub fn uses_process_group(&self) -> bool {
        self.shared.process_group
    }

    pub fn is_disconnect(&self) -> bool {
        self.shared.disconnect
    }

    pub fn pid(&self) -> Option<u32> {
        self.shared.status.borrow().pid
    }

    pub fn is_halted(&self) -> bool {
        self.shared.status.borrow().halted
    }

    /// `None` until the terminal event; then fixed. A process detached in
    /// disconnect mode reports [`DISCONNECTED_EXIT_CODE`].
    pub fn exit_code(&self) -> Option<i32> {
        self.shared.status.borrow().exit_code
    }

    /// Whether the OS has reported the child's exit. Output from descendants
    /// holding the pipes may still be arriving.
    pub fn is_reaped(&self) -> bool {
        self.shared.status.borrow().reaped
    }

    /// True until the terminal event has fired.
    pub fn is_live(&self) -> bool {
        !self.shared.status.borrow().closed
    }

    pub fn state(&self) -> ProcessState {
        let status = self.shared.status.borrow();
        if status.halted {
            ProcessState::Halted
        } else if status.pid.is_some() {
            ProcessState::Running
        } else {
            ProcessState::Spawning
        }
    }

    /// Snapshot of all captured output.
    pub fn output(&self) -> OutputBuffers {
        self.buffers().clone()
    }

    pub fn stdout(&self) -> String {
        self.buffers().stdout()
    }

    pub fn stderr(&self) -> String {
        self.buffers().stderr()
    }

    pub fn combined(&self) -> String {
        self.buffers().combined()
    }

    /// Subscribe to output and terminal events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.shared.events.subscribe()
    }

    fn buffers(&self) -> MutexGuard<'_, OutputBuffers> {
        self.shared
            .output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn render_command_line(command: &str, args: &[String]) -> String {
    std::iter::once(command)
        .chain(args.iter().map(String::as_str))
        .map(|part| {
            if part.is_empty() || part.contains(char::is_whitespace) || part.contains('"') {
                format!("{part:?}")
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
