#![allow(dead_code)]

use std::path::Path;

use childwarden::config::{RawSupervisorConfig, SupervisorConfig};
use childwarden::{ProcessOptions, ProcessRegistry, Signal};

/// Builder for `ProcessOptions` to simplify test setup.
#[derive(Default)]
pub struct ProcessOptionsBuilder {
    options: ProcessOptions,
}

impl ProcessOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.options.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.options.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn signal(mut self, signal: Signal) -> Self {
        self.options.signal = Some(signal);
        self
    }

    pub fn process_group(mut self, val: bool) -> Self {
        self.options.process_group = Some(val);
        self
    }

    pub fn disconnect(mut self, val: bool) -> Self {
        self.options.disconnect = val;
        self
    }

    pub fn metadata(mut self, key: &str, value: &str) -> Self {
        self.options.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> ProcessOptions {
        self.options
    }
}

/// Builder for a `ProcessRegistry` with non-default configuration.
pub struct RegistryBuilder {
    raw: RawSupervisorConfig,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawSupervisorConfig::default(),
        }
    }

    pub fn text_timeout_ms(mut self, ms: u64) -> Self {
        self.raw.waits.text_timeout_ms = ms;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.raw.waits.poll_interval_ms = ms;
        self
    }

    pub fn poll_timeout_ms(mut self, ms: u64) -> Self {
        self.raw.waits.poll_timeout_ms = ms;
        self
    }

    pub fn default_signal(mut self, signal: Signal) -> Self {
        self.raw.process.default_signal = signal;
        self
    }

    pub fn process_group(mut self, val: bool) -> Self {
        self.raw.process.process_group = val;
        self
    }

    pub fn shutdown_signal(mut self, signal: Signal) -> Self {
        self.raw.shutdown.signal = signal;
        self
    }

    pub fn exit_timeout_ms(mut self, ms: u64) -> Self {
        self.raw.shutdown.exit_timeout_ms = ms;
        self
    }

    pub fn build(self) -> ProcessRegistry {
        let config =
            SupervisorConfig::try_from(self.raw).expect("Failed to build valid config from builder");
        ProcessRegistry::with_config(config)
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
