// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::types::Signal;

/// Command-line arguments for `childwarden`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "childwarden",
    version,
    about = "Spawn a child process, watch its output and shut it down cleanly.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). Defaults apply if it does not exist.
    #[arg(long, value_name = "PATH", default_value = "Childwarden.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CHILDWARDEN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run one command under supervision.
    Run(RunArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Working directory for the child.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Environment override, repeatable.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Caller metadata attached to log lines, repeatable.
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub metadata: Vec<(String, String)>,

    /// Signal used when the child has to be halted (e.g. SIGTERM, INT).
    #[arg(long, value_name = "SIGNAL")]
    pub signal: Option<Signal>,

    /// Run the child in its own process group.
    #[arg(long)]
    pub process_group: bool,

    /// Wait until stdout contains this text before waiting for exit.
    #[arg(long, value_name = "TEXT")]
    pub wait_for: Option<String>,

    /// Wait until this file exists before waiting for exit.
    #[arg(long, value_name = "PATH")]
    pub wait_for_file: Option<PathBuf>,

    /// Timeout for `--wait-for` / `--wait-for-file` (0 disables it).
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Print what would be run, but don't spawn anything.
    #[arg(long)]
    pub dry_run: bool,

    /// The command and its arguments, passed to the OS as-is.
    #[arg(
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    pub command: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
