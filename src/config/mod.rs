// src/config/mod.rs

//! Configuration loading and validation for childwarden.
//!
//! - `model.rs` defines the TOML-backed data model.
//! - `loader.rs` reads a config file from disk.
//! - `validate.rs` checks timeouts and intervals are usable.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    ProcessSection, RawSupervisorConfig, ShutdownSection, SupervisorConfig, WaitsSection,
};
pub use validate::validate_raw_config;
