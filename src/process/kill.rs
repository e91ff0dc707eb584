// src/process/kill.rs

//! Halting a managed process and delivering signals to it.

use tracing::{debug, info, warn};

use crate::types::Signal;

use super::{DISCONNECTED_EXIT_CODE, ManagedProcess};

impl ManagedProcess {
    /// Stop the process.
    ///
    /// Sends `signal` (or the configured default) to the process group when
    /// the process runs in its own group, then to the child itself. Marks the
    /// process halted right away; the exit code is recorded later, when the
    /// OS reports the close.
    ///
    /// Once the child has been reaped its pid may belong to another process,
    /// so only the process group (if any) is signalled.
    ///
    /// In disconnect mode no signal is sent: output capture and forwarding
    /// stop and the process becomes terminal with
    /// [`DISCONNECTED_EXIT_CODE`].
    ///
    /// Kill failures are logged and swallowed. Always returns `true`, and
    /// calling it again is harmless (it re-sends the signal while the child
    /// has not closed yet).
    pub fn halt(&self, signal: Option<Signal>) -> bool {
        let signal = signal.unwrap_or(self.shared.signal);
        let status = self.shared.status.borrow().clone();

        if status.closed {
            debug!(cmd = %self.shared.command_line, "halt on closed process; nothing to do");
            return true;
        }

        if self.shared.disconnect {
            info!(
                pid = status.pid,
                cmd = %self.shared.command_line,
                "disconnecting from process instead of signalling"
            );
            self.finish(DISCONNECTED_EXIT_CODE);
            return true;
        }

        info!(
            pid = status.pid,
            cmd = %self.shared.command_line,
            %signal,
            "halting process"
        );

        if status.pid.is_some() {
            if self.shared.process_group {
                self.signal_group(signal);
            }
            self.signal_direct(signal);
        }

        self.shared.status.send_modify(|status| status.halted = true);
        true
    }

    /// Deliver a host signal to the child: its whole group first when it runs
    /// in its own group, the child alone if that fails or is not configured.
    ///
    /// Returns whether any delivery succeeded. Halted and disconnected
    /// processes are skipped. Does not mark the process halted; what the
    /// child does with the signal is up to it.
    pub fn forward_signal(&self, signal: Signal) -> bool {
        if self.is_halted() || self.shared.disconnect {
            return false;
        }
        if self.shared.process_group && self.signal_group(signal) {
            return true;
        }
        self.signal_direct(signal)
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: Signal) -> bool {
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        let Some(pid) = self.pid() else {
            return false;
        };

        match killpg(Pid::from_raw(pid as i32), signal.to_nix()) {
            Ok(()) => {
                debug!(pgid = pid, %signal, "signalled process group");
                true
            }
            Err(errno) => {
                debug!(
                    pgid = pid,
                    %signal,
                    error = %errno,
                    "process group signal failed; falling back to direct signal"
                );
                false
            }
        }
    }

    #[cfg(unix)]
    fn signal_direct(&self, signal: Signal) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let (pid, reaped) = {
            let status = self.shared.status.borrow();
            (status.pid, status.reaped)
        };
        let Some(pid) = pid else {
            return false;
        };
        if reaped {
            debug!(pid, %signal, "process already reaped; not signalling its pid");
            return false;
        }

        match kill(Pid::from_raw(pid as i32), signal.to_nix()) {
            Ok(()) => {
                debug!(pid, %signal, "signalled process");
                true
            }
            Err(errno) => {
                warn!(pid, %signal, error = %errno, "failed to signal process");
                false
            }
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&self, _signal: Signal) -> bool {
        false
    }

    #[cfg(not(unix))]
    fn signal_direct(&self, signal: Signal) -> bool {
        debug!(pid = self.pid(), %signal, "requesting kill (no signals on this platform)");
        self.shared.kill_requested.notify_one();
        true
    }
}
