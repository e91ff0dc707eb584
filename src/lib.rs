// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod interval;
pub mod logging;
pub mod process;
pub mod registry;
pub mod scrub;
pub mod signals;
pub mod types;

pub use errors::{ChildwardenError, Result};
pub use process::{ManagedProcess, OutputEvent, ProcessOptions, ProcessState, Stream};
pub use registry::{ProcessRegistry, ShutdownReport, quit_all_child_processes};
pub use signals::SignalForwarder;
pub use types::Signal;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use crate::cli::{CliArgs, Command, RunArgs};
use crate::config::{SupervisorConfig, load_or_default};

/// High-level entry point used by `main.rs`. Returns the exit code the host
/// should exit with.
///
/// This wires together:
/// - config loading
/// - a registry and the host signal forwarder
/// - the supervised child and its optional readiness wait
/// - shutdown of everything still running
pub async fn run(args: CliArgs) -> anyhow::Result<i32> {
    let config = load_or_default(&args.config)
        .with_context(|| format!("loading config from '{}'", args.config))?;

    match args.command {
        Command::Run(run_args) => run_supervised(config, run_args).await,
    }
}

async fn run_supervised(config: SupervisorConfig, args: RunArgs) -> anyhow::Result<i32> {
    let (program, program_args) = args
        .command
        .split_first()
        .context("no command given")?;

    let options = ProcessOptions {
        cwd: args.cwd.clone(),
        env: args.env.iter().cloned().collect(),
        signal: args.signal,
        process_group: args.process_group.then_some(true),
        disconnect: false,
        metadata: args.metadata.iter().cloned().collect::<BTreeMap<_, _>>(),
    };

    if args.dry_run {
        print_dry_run(&config, program, program_args, &options);
        return Ok(0);
    }

    let registry = ProcessRegistry::with_config(config);
    let forwarder = SignalForwarder::install(registry.clone())
        .context("installing host signal handlers")?;
    let mut host_signals = forwarder.subscribe();

    let process = registry.spawn(program.as_str(), program_args.iter().cloned(), options)?;
    let timeout = args.timeout_ms.map(Duration::from_millis);

    let supervised = async {
        if let Some(text) = &args.wait_for {
            let limit = timeout.or(registry.config().waits.text_timeout());
            process.wait_for_text_within(text, limit).await?;
            info!(marker = %text, "child reported ready");
        }

        if let Some(path) = &args.wait_for_file {
            let limit = timeout.or(registry.config().waits.poll_timeout());
            let marker = path.clone();
            process
                .wait_for_poll_with(
                    move || {
                        let marker = marker.clone();
                        async move { Ok::<bool, anyhow::Error>(tokio::fs::try_exists(&marker).await?) }
                    },
                    registry.config().waits.poll_interval(),
                    limit,
                )
                .await?;
            info!(path = %path.display(), "awaited file appeared");
        }

        Ok::<i32, ChildwardenError>(process.wait_for_exit().await)
    };

    let outcome = tokio::select! {
        result = supervised => result,
        received = host_signals.recv() => {
            let signal = received.unwrap_or(Signal::Interrupt);
            warn!(%signal, "host signal received; shutting down children");
            let report = registry.quit_all_child_processes().await;
            debug!(?report, "shutdown report");
            print!("{}", process.combined());
            return Ok(128 + signal.number());
        }
    };

    print!("{}", process.combined());

    match outcome {
        Ok(code) => {
            info!(exit_code = code, "child exited");
            Ok(code)
        }
        Err(err) => {
            error!(error = %err, "supervision failed; stopping child");
            registry.quit_all_child_processes().await;
            Err(err.into())
        }
    }
}

/// Print the resolved command and effective settings without spawning.
fn print_dry_run(
    cfg: &SupervisorConfig,
    program: &str,
    program_args: &[String],
    options: &ProcessOptions,
) {
    println!("childwarden dry-run");
    println!("  command: {program}");
    if !program_args.is_empty() {
        println!("  args: {:?}", program_args);
    }
    if let Some(ref cwd) = options.cwd {
        println!("  cwd: {}", cwd.display());
    }
    for (key, value) in options.env.iter() {
        println!("  env: {key}={value}");
    }
    for (key, value) in options.metadata.iter() {
        println!("  meta: {key}={value}");
    }
    println!(
        "  signal: {}",
        options.signal.unwrap_or(cfg.process.default_signal)
    );
    println!(
        "  process_group: {}",
        options.process_group.unwrap_or(cfg.process.process_group)
    );
    println!();
    println!("  waits.text_timeout_ms = {}", cfg.waits.text_timeout_ms);
    println!("  waits.poll_interval_ms = {}", cfg.waits.poll_interval_ms);
    println!("  waits.poll_timeout_ms = {}", cfg.waits.poll_timeout_ms);
    println!("  shutdown.signal = {}", cfg.shutdown.signal);
    println!("  shutdown.exit_timeout_ms = {}", cfg.shutdown.exit_timeout_ms);

    debug!("dry-run complete (nothing spawned)");
}
