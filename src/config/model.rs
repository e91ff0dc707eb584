// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::types::Signal;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [waits]
/// text_timeout_ms = 60000
/// poll_interval_ms = 250
/// poll_timeout_ms = 120000
///
/// [process]
/// default_signal = "SIGTERM"
/// process_group = false
///
/// [shutdown]
/// signal = "SIGKILL"
/// exit_timeout_ms = 5000
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawSupervisorConfig {
    #[serde(default)]
    pub waits: WaitsSection,

    #[serde(default)]
    pub process: ProcessSection,

    #[serde(default)]
    pub shutdown: ShutdownSection,
}

/// Validated configuration. Build it with `SupervisorConfig::try_from(raw)`
/// or take the defaults.
#[derive(Debug, Clone, Default)]
pub struct SupervisorConfig {
    pub waits: WaitsSection,
    pub process: ProcessSection,
    pub shutdown: ShutdownSection,
}

impl SupervisorConfig {
    pub(crate) fn new_unchecked(
        waits: WaitsSection,
        process: ProcessSection,
        shutdown: ShutdownSection,
    ) -> Self {
        Self {
            waits,
            process,
            shutdown,
        }
    }
}

/// `[waits]` section: default timeouts for the wait primitives.
///
/// A timeout of `0` disables it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitsSection {
    #[serde(default = "default_text_timeout_ms")]
    pub text_timeout_ms: u64,

    /// Cadence of poll waits. Must be non-zero.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

fn default_text_timeout_ms() -> u64 {
    60_000
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_poll_timeout_ms() -> u64 {
    120_000
}

impl Default for WaitsSection {
    fn default() -> Self {
        Self {
            text_timeout_ms: default_text_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl WaitsSection {
    pub fn text_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.text_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.poll_timeout_ms)
    }
}

/// `[process]` section: defaults for newly spawned processes.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProcessSection {
    /// Signal `halt()` sends when the caller does not pick one.
    #[serde(default)]
    pub default_signal: Signal,

    /// Whether processes run in their own process group by default.
    #[serde(default)]
    pub process_group: bool,
}

/// `[shutdown]` section: how `quit_all_child_processes` stops children.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShutdownSection {
    #[serde(default = "default_shutdown_signal")]
    pub signal: Signal,

    /// Upper bound on waiting for each child to confirm its exit. Must be
    /// non-zero.
    #[serde(default = "default_exit_timeout_ms")]
    pub exit_timeout_ms: u64,
}

fn default_shutdown_signal() -> Signal {
    Signal::Kill
}

fn default_exit_timeout_ms() -> u64 {
    5_000
}

impl Default for ShutdownSection {
    fn default() -> Self {
        Self {
            signal: default_shutdown_signal(),
            exit_timeout_ms: default_exit_timeout_ms(),
        }
    }
}

impl ShutdownSection {
    pub fn exit_timeout(&self) -> Duration {
        Duration::from_millis(self.exit_timeout_ms)
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
