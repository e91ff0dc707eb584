// src/process/capture.rs

//! Spawning a managed process and capturing its output.
//!
//! One Tokio task per pipe publishes whatever each read returns (see
//! [`ChunkDecoder`] for the bytes it holds back), scrubbed and appended to
//! the buffers. A reaper task waits for the child, then for both readers to
//! hit EOF, and only then publishes the terminal event, so every chunk
//! reaches listeners before `Closed`.

use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::scrub::scrub;

use super::decode::ChunkDecoder;
use super::{ManagedProcess, OutputEvent, SPAWN_FAILURE_EXIT_CODE, Stream};

const READ_BUFFER_SIZE: usize = 8 * 1024;

impl ManagedProcess {
    /// Spawn the OS process. Called exactly once, from construction.
    pub(super) fn start(&self) {
        let shared = &self.shared;

        let mut cmd = Command::new(&shared.command);
        cmd.args(&shared.args)
            .envs(&shared.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        if let Some(cwd) = &shared.cwd {
            cmd.current_dir(cwd);
        }

        #[cfg(unix)]
        if shared.process_group {
            cmd.process_group(0);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(
                    cmd = %shared.command_line,
                    meta = ?shared.metadata,
                    error = %err,
                    "failed to spawn process"
                );
                self.record(Stream::Stderr, &format!("{err}\n"));
                self.finish(SPAWN_FAILURE_EXIT_CODE);
                return;
            }
        };

        let pid = child.id();
        shared.status.send_modify(|status| status.pid = pid);

        info!(
            pid,
            cmd = %shared.command_line,
            meta = ?shared.metadata,
            process_group = shared.process_group,
            "spawned process"
        );

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(self.clone(), Stream::Stdout, stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(self.clone(), Stream::Stderr, stderr));
        }

        tokio::spawn(reap(self.clone(), child, readers));
    }

    /// Scrub and append a chunk, then publish it.
    ///
    /// Returns `false` when the chunk was dropped because the process is
    /// already halted.
    pub(super) fn record(&self, stream: Stream, raw: &str) -> bool {
        let text = scrub(raw);

        let mut buffers = self.buffers();
        if self.shared.status.borrow().halted {
            trace!(
                cmd = %self.shared.command_line,
                stream = stream.as_str(),
                "dropping output received after halt"
            );
            return false;
        }

        debug!(
            pid = self.pid(),
            stream = stream.as_str(),
            "{}",
            text.trim_end()
        );

        buffers.push(stream, &text);
        let event = match stream {
            Stream::Stdout => OutputEvent::Stdout(text.into_owned()),
            Stream::Stderr => OutputEvent::Stderr(text.into_owned()),
        };
        // No subscribers is fine.
        let _ = self.shared.events.send(event);
        true
    }

    /// Fire the terminal event. Only the first call has any effect.
    pub(super) fn finish(&self, exit_code: i32) {
        let first = self.shared.status.send_if_modified(|status| {
            if status.closed {
                return false;
            }
            status.closed = true;
            status.halted = true;
            status.exit_code = Some(exit_code);
            true
        });

        if !first {
            debug!(
                cmd = %self.shared.command_line,
                exit_code,
                "terminal event already fired; ignoring exit"
            );
            return;
        }

        info!(
            pid = self.pid(),
            cmd = %self.shared.command_line,
            meta = ?self.shared.metadata,
            exit_code,
            "process closed"
        );

        let _ = self.shared.events.send(OutputEvent::Closed { exit_code });
    }
}

fn spawn_reader<R>(process: ManagedProcess, stream: Stream, mut pipe: R) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut decoder = ChunkDecoder::default();

        loop {
            match pipe.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if let Some(text) = decoder.feed(&buf[..n]) {
                        process.record(stream, &text);
                    }
                }
                Err(e) => {
                    debug!(
                        cmd = %process.command_line(),
                        stream = stream.as_str(),
                        error = %e,
                        "error reading pipe; stopping capture"
                    );
                    break;
                }
            }
        }

        if let Some(rest) = decoder.finish() {
            process.record(stream, &rest);
        }

        trace!(
            cmd = %process.command_line(),
            stream = stream.as_str(),
            "pipe reader finished"
        );
    })
}

async fn reap(process: ManagedProcess, mut child: Child, readers: Vec<JoinHandle<()>>) {
    let status = wait_child(&process, &mut child).await;

    // The pid may be reused from here on; readers can still be draining
    // pipes held open by descendants.
    process.shared.status.send_modify(|s| s.reaped = true);
    debug!(
        pid = process.pid(),
        cmd = %process.command_line(),
        "process reaped; waiting for output to drain"
    );

    for reader in readers {
        if let Err(e) = reader.await {
            warn!(cmd = %process.command_line(), error = %e, "pipe reader task failed");
        }
    }

    let code = match status {
        Ok(status) => exit_code_of(status),
        Err(e) => {
            error!(
                cmd = %process.command_line(),
                error = %e,
                "failed waiting for process"
            );
            SPAWN_FAILURE_EXIT_CODE
        }
    };

    process.finish(code);
}

#[cfg(unix)]
async fn wait_child(_process: &ManagedProcess, child: &mut Child) -> std::io::Result<ExitStatus> {
    child.wait().await
}

#[cfg(not(unix))]
async fn wait_child(process: &ManagedProcess, child: &mut Child) -> std::io::Result<ExitStatus> {
    loop {
        tokio::select! {
            status = child.wait() => return status,
            _ = process.shared.kill_requested.notified() => {
                if let Err(e) = child.start_kill() {
                    warn!(cmd = %process.command_line(), error = %e, "failed to kill process");
                }
            }
        }
    }
}

/// Exit code, or `128 + signal` when the child was killed by a signal.
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    SPAWN_FAILURE_EXIT_CODE
}
