// src/config/validate.rs

use crate::config::model::{RawSupervisorConfig, SupervisorConfig};
use crate::errors::{ChildwardenError, Result};

impl TryFrom<RawSupervisorConfig> for SupervisorConfig {
    type Error = ChildwardenError;

    fn try_from(raw: RawSupervisorConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(SupervisorConfig::new_unchecked(
            raw.waits,
            raw.process,
            raw.shutdown,
        ))
    }
}

/// Check the invariants `SupervisorConfig` relies on.
pub fn validate_raw_config(cfg: &RawSupervisorConfig) -> Result<()> {
    validate_waits(cfg)?;
    validate_shutdown(cfg)?;
    Ok(())
}

fn validate_waits(cfg: &RawSupervisorConfig) -> Result<()> {
    if cfg.waits.poll_interval_ms == 0 {
        return Err(ChildwardenError::ConfigError(
            "[waits].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.waits.poll_timeout_ms != 0 && cfg.waits.poll_timeout_ms < cfg.waits.poll_interval_ms {
        return Err(ChildwardenError::ConfigError(format!(
            "[waits].poll_timeout_ms ({}) is shorter than poll_interval_ms ({})",
            cfg.waits.poll_timeout_ms, cfg.waits.poll_interval_ms
        )));
    }

    Ok(())
}

fn validate_shutdown(cfg: &RawSupervisorConfig) -> Result<()> {
    // Unbounded waits here would let one stuck child hang host shutdown.
    if cfg.shutdown.exit_timeout_ms == 0 {
        return Err(ChildwardenError::ConfigError(
            "[shutdown].exit_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
