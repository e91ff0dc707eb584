// src/signals.rs

//! Host signal forwarding.
//!
//! A single dispatcher task per registry listens for the host's termination
//! signals and re-delivers each one to every live process in the registry
//! (process group first where configured, see
//! [`ManagedProcess::forward_signal`](crate::process::ManagedProcess::forward_signal)).
//! Received signals are also re-published so the host can start its own
//! teardown, typically by calling
//! [`ProcessRegistry::quit_all_child_processes`].
//!
//! ## Unix
//! SIGINT, SIGTERM, SIGQUIT and SIGHUP are handled. Installing the forwarder
//! replaces the default "terminate the host" action for those signals; the
//! host must react to [`SignalForwarder::subscribe`] itself.
//!
//! ## Other platforms
//! Only Ctrl-C is handled and forwarded as [`Signal::Interrupt`].

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::registry::ProcessRegistry;
use crate::types::Signal;

/// Running signal dispatcher. Dropping it stops forwarding.
#[derive(Debug)]
pub struct SignalForwarder {
    task: JoinHandle<()>,
    received: broadcast::Sender<Signal>,
}

impl SignalForwarder {
    /// Start forwarding host signals to the live processes of `registry`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn install(registry: ProcessRegistry) -> std::io::Result<Self> {
        let (received, _) = broadcast::channel(16);
        let listener = HostSignals::new()?;

        let tx = received.clone();
        let task = tokio::spawn(async move {
            let mut listener = listener;
            info!("host signal forwarder started");

            while let Some(signal) = listener.recv().await {
                let delivered = registry.forward_signal(signal);
                info!(%signal, delivered, "forwarded host signal to child processes");
                // Nobody listening is fine.
                let _ = tx.send(signal);
            }

            debug!("host signal streams closed; forwarder exiting");
        });

        Ok(Self { task, received })
    }

    /// Signals received by the host after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.received.subscribe()
    }

    /// Stop forwarding.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for SignalForwarder {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(unix)]
struct HostSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl HostSignals {
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    async fn recv(&mut self) -> Option<Signal> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Some(Signal::Interrupt),
            Some(()) = self.terminate.recv() => Some(Signal::Terminate),
            Some(()) = self.quit.recv() => Some(Signal::Quit),
            Some(()) = self.hangup.recv() => Some(Signal::Hangup),
            else => None,
        }
    }
}

#[cfg(not(unix))]
struct HostSignals;

#[cfg(not(unix))]
impl HostSignals {
    fn new() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> Option<Signal> {
        tokio::signal::ctrl_c().await.ok().map(|()| Signal::Interrupt)
    }
}
