// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Only the two wait failures ([`ChildwardenError::WaitTimeout`] and
//! [`ChildwardenError::HaltedBeforeMatch`]) are meant to reach calling logic
//! as actionable errors. Spawn and kill failures are absorbed into process
//! state and logs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChildwardenError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Unknown signal: {0}")]
    UnknownSignal(String),

    /// A wait exceeded its deadline. The process keeps running.
    #[error("timed out after {timeout_ms}ms waiting for {awaited} from `{command_line}`")]
    WaitTimeout {
        awaited: String,
        command_line: String,
        timeout_ms: u128,
    },

    /// The process reached its terminal state before the wait was satisfied.
    #[error("process `{command_line}` halted before {awaited} was observed")]
    HaltedBeforeMatch {
        awaited: String,
        command_line: String,
    },
}

impl ChildwardenError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ChildwardenError::WaitTimeout { .. })
    }

    pub fn is_halted_before_match(&self) -> bool {
        matches!(self, ChildwardenError::HaltedBeforeMatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, ChildwardenError>;
