// src/process/wait.rs

//! Synchronisation primitives on a managed process.
//!
//! All waits are plain futures: they finish on their condition, on their
//! timeout, or when the process halts. Dropping a wait cancels it and
//! releases its event subscription, timer and poll loop.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::{ChildwardenError, Result};
use crate::interval::spawn_interval;

use super::{DISCONNECTED_EXIT_CODE, ManagedProcess, OutputEvent};

impl ManagedProcess {
    /// Wait until a scrubbed stdout chunk contains `partial`, using the
    /// configured default timeout (60s unless overridden in `[waits]`).
    pub async fn wait_for_text(&self, partial: &str) -> Result<ManagedProcess> {
        self.wait_for_text_within(partial, self.shared.waits.text_timeout())
            .await
    }

    /// Wait until a scrubbed stdout chunk contains `partial`.
    ///
    /// Chunks captured before the call count too. `None` or a zero timeout
    /// waits indefinitely. Fails with [`ChildwardenError::WaitTimeout`] when
    /// the deadline passes (the process keeps running) and with
    /// [`ChildwardenError::HaltedBeforeMatch`] when the process halts first.
    pub async fn wait_for_text_within(
        &self,
        partial: &str,
        timeout: Option<Duration>,
    ) -> Result<ManagedProcess> {
        let awaited = format!("text {partial:?}");

        let matcher = async {
            // Subscribe before scanning the buffer so no chunk falls between.
            let mut events = self.shared.events.subscribe();
            let mut status = self.shared.status.subscribe();

            if self.buffers().stdout_contains(partial) {
                return Ok(self.clone());
            }
            if status.borrow_and_update().halted {
                return Err(self.halted_error(&awaited));
            }

            loop {
                tokio::select! {
                    biased;

                    event = events.recv() => match event {
                        Ok(OutputEvent::Stdout(chunk)) if chunk.contains(partial) => {
                            return Ok(self.clone());
                        }
                        Ok(OutputEvent::Closed { .. }) | Err(RecvError::Closed) => {
                            return Err(self.halted_error(&awaited));
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                cmd = %self.shared.command_line,
                                skipped,
                                "text wait lagged behind output; rescanning buffer"
                            );
                            if self.buffers().stdout_contains(partial) {
                                return Ok(self.clone());
                            }
                        }
                    },

                    changed = status.changed() => {
                        if changed.is_err() || status.borrow_and_update().halted {
                            return Err(self.halted_error(&awaited));
                        }
                    }
                }
            }
        };

        self.with_deadline(matcher, timeout, &awaited).await
    }

    /// Poll `poll_fn` with the configured default interval and timeout
    /// (250ms / 120s unless overridden in `[waits]`).
    pub async fn wait_for_poll<F, Fut>(&self, poll_fn: F) -> Result<ManagedProcess>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        let waits = &self.shared.waits;
        self.wait_for_poll_with(poll_fn, waits.poll_interval(), waits.poll_timeout())
            .await
    }

    /// Poll `poll_fn` every `interval` until it returns `Ok(true)`.
    ///
    /// Invocations never overlap: ticks that fire while a call is still
    /// running are dropped. An `Err` from the predicate counts as `false` for
    /// that tick. Fails on timeout or when the process halts first.
    pub async fn wait_for_poll_with<F, Fut>(
        &self,
        mut poll_fn: F,
        interval: Duration,
        timeout: Option<Duration>,
    ) -> Result<ManagedProcess>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        let interval = interval.max(Duration::from_millis(1));
        let awaited = format!("poll predicate (every {}ms)", interval.as_millis());

        let matcher = async {
            let mut status = self.shared.status.subscribe();
            if status.borrow_and_update().halted {
                return Err(self.halted_error(&awaited));
            }

            let (done_tx, mut done_rx) = mpsc::channel::<()>(1);
            let command_line = self.shared.command_line.clone();
            let _poller = spawn_interval(interval, move || {
                let check = poll_fn();
                let done_tx = done_tx.clone();
                let command_line = command_line.clone();
                async move {
                    match check.await {
                        Ok(true) => {
                            let _ = done_tx.try_send(());
                        }
                        Ok(false) => {}
                        Err(e) => {
                            debug!(
                                cmd = %command_line,
                                error = %e,
                                "poll predicate failed; treating as false"
                            );
                        }
                    }
                }
            });

            loop {
                tokio::select! {
                    biased;

                    _ = done_rx.recv() => return Ok(self.clone()),

                    changed = status.changed() => {
                        if changed.is_err() || status.borrow_and_update().halted {
                            return Err(self.halted_error(&awaited));
                        }
                    }
                }
            }
        };

        self.with_deadline(matcher, timeout, &awaited).await
    }

    /// Wait for the terminal event and return the exit code.
    ///
    /// Returns immediately when the process has already closed. A process
    /// detached in disconnect mode reports [`DISCONNECTED_EXIT_CODE`].
    pub async fn wait_for_exit(&self) -> i32 {
        let mut status = self.shared.status.subscribe();
        let result = status.wait_for(|s| s.closed).await;
        let exit_code = match result {
            Ok(status) => status.exit_code,
            // The sender lives as long as `self`, so this is unreachable in
            // practice.
            Err(_) => self.exit_code(),
        };
        exit_code.unwrap_or(DISCONNECTED_EXIT_CODE)
    }

    async fn with_deadline<F>(
        &self,
        matcher: F,
        timeout: Option<Duration>,
        awaited: &str,
    ) -> Result<ManagedProcess>
    where
        F: Future<Output = Result<ManagedProcess>>,
    {
        match timeout.filter(|t| !t.is_zero()) {
            None => matcher.await,
            Some(limit) => match tokio::time::timeout(limit, matcher).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(
                        cmd = %self.shared.command_line,
                        awaited,
                        timeout_ms = limit.as_millis() as u64,
                        "wait timed out"
                    );
                    Err(ChildwardenError::WaitTimeout {
                        awaited: awaited.to_string(),
                        command_line: self.shared.command_line.clone(),
                        timeout_ms: limit.as_millis(),
                    })
                }
            },
        }
    }

    fn halted_error(&self, awaited: &str) -> ChildwardenError {
        ChildwardenError::HaltedBeforeMatch {
            awaited: awaited.to_string(),
            command_line: self.shared.command_line.clone(),
        }
    }
}
