// tests/shutdown.rs
#![cfg(unix)]

mod common;
use crate::common::{GENEROUS, TestResult, init_tracing, with_timeout};

use std::time::{Duration, Instant};

use childwarden::{
    ManagedProcess, ProcessOptions, ProcessRegistry, ShutdownReport, quit_all_child_processes,
};
use childwarden_test_utils::builders::{ProcessOptionsBuilder, RegistryBuilder};
use childwarden_test_utils::{sh, sh_with};

#[tokio::test]
async fn quit_all_kills_every_live_child() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let children: Vec<_> = (0..3).map(|_| sh(&registry, "exec sleep 30")).collect();

    let report = with_timeout(registry.quit_all_child_processes()).await;

    assert_eq!(
        report,
        ShutdownReport {
            signalled: 3,
            exited: 3,
            timed_out: 0,
        }
    );
    for child in &children {
        assert!(!child.is_live());
        assert_eq!(child.exit_code(), Some(137), "SIGKILL is the shutdown signal");
    }
    assert!(registry.live().is_empty());
    Ok(())
}

#[tokio::test]
async fn one_unconfirmed_exit_does_not_block_the_others() -> TestResult {
    init_tracing();
    let registry = RegistryBuilder::new().exit_timeout_ms(300).build();

    let a = sh(&registry, "exec sleep 30");
    // The background sleep inherits the output pipes and outlives the kill,
    // so this child cannot report closed until it finishes.
    let stuck = sh(&registry, "sleep 3 & echo started; exec sleep 30");
    let b = sh(&registry, "exec sleep 30");
    stuck.wait_for_text_within("started", Some(GENEROUS)).await?;

    let started = Instant::now();
    let report = with_timeout(registry.quit_all_child_processes()).await;
    let elapsed = started.elapsed();

    assert_eq!(report.signalled, 3);
    assert_eq!(report.exited, 2);
    assert_eq!(report.timed_out, 1);
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");

    assert_eq!(a.exit_code(), Some(137));
    assert_eq!(b.exit_code(), Some(137));
    assert!(stuck.is_halted());
    assert!(stuck.is_live(), "still waiting on its pipes");
    Ok(())
}

#[tokio::test]
async fn process_groups_let_shutdown_reach_grandchildren() -> TestResult {
    init_tracing();
    let registry = RegistryBuilder::new()
        .process_group(true)
        .exit_timeout_ms(1_000)
        .build();

    let p = sh(&registry, "sleep 30 & echo started; wait");
    p.wait_for_text_within("started", Some(GENEROUS)).await?;

    let report = with_timeout(registry.quit_all_child_processes()).await;
    assert_eq!(report.exited, 1);
    assert_eq!(report.timed_out, 0);
    assert_eq!(p.exit_code(), Some(137));
    Ok(())
}

#[tokio::test]
async fn closed_and_detached_processes_are_skipped() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();

    let finished = sh(&registry, "exit 4");
    with_timeout(finished.wait_for_exit()).await;

    let detached = sh_with(
        &registry,
        "exec sleep 0.2",
        ProcessOptionsBuilder::new().disconnect(true).build(),
    );
    detached.halt(None);

    let running = sh(&registry, "exec sleep 30");

    assert_eq!(registry.len(), 3);
    assert_eq!(registry.live().len(), 1);

    let report = with_timeout(registry.quit_all_child_processes()).await;
    assert_eq!(report.signalled, 1);
    assert_eq!(report.exited, 1);
    assert_eq!(finished.exit_code(), Some(4), "terminal state is left alone");
    assert_eq!(running.exit_code(), Some(137));
    Ok(())
}

#[tokio::test]
async fn quitting_an_empty_registry_is_a_no_op() {
    init_tracing();
    let registry = ProcessRegistry::new();
    let report = with_timeout(registry.quit_all_child_processes()).await;
    assert_eq!(report, ShutdownReport::default());
}

#[tokio::test]
async fn registry_keeps_every_spawned_process_in_order() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let first = sh(&registry, "exit 0");
    let second = registry.spawn("/bin/echo", ["hello"], ProcessOptions::default())?;

    with_timeout(first.wait_for_exit()).await;
    with_timeout(second.wait_for_exit()).await;

    let all = registry.all();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].command_line(), first.command_line());
    assert_eq!(all[1].command_line(), "/bin/echo hello");
    assert!(registry.live().is_empty());

    // Clones share the same entries.
    let alias = registry.clone();
    sh(&alias, "exit 0");
    assert_eq!(registry.len(), 3);
    Ok(())
}

#[tokio::test]
async fn global_registry_backs_the_free_functions() -> TestResult {
    init_tracing();
    let p = ManagedProcess::spawn("/bin/sh", ["-c", "exec sleep 30"], ProcessOptions::default())?;
    assert!(p.is_live());

    let report = with_timeout(quit_all_child_processes()).await;
    assert!(report.signalled >= 1);
    assert_eq!(p.exit_code(), Some(137));
    Ok(())
}
