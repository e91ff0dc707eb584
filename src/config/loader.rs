// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawSupervisorConfig, SupervisorConfig};
use crate::errors::Result;

/// Load a configuration file from a given path without validating it.
///
/// Use [`load_and_validate`] for anything that is going to spawn processes.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSupervisorConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawSupervisorConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<SupervisorConfig> {
    let raw_config = load_from_path(&path)?;
    let config = SupervisorConfig::try_from(raw_config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to defaults.
///
/// A file that exists but fails to parse or validate is still an error.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<SupervisorConfig> {
    let path = path.as_ref();
    if path.exists() {
        load_and_validate(path)
    } else {
        Ok(SupervisorConfig::default())
    }
}

/// `Childwarden.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Childwarden.toml")
}
