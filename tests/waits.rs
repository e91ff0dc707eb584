// tests/waits.rs
#![cfg(unix)]

mod common;
use crate::common::{GENEROUS, SHORT, TestResult, init_tracing, with_timeout};

use std::time::{Duration, Instant};

use childwarden::process::Stream;
use childwarden::{ChildwardenError, ProcessRegistry};
use childwarden_test_utils::builders::{ProcessOptionsBuilder, RegistryBuilder};
use childwarden_test_utils::predicates::CountingPredicate;
use childwarden_test_utils::{sh, sh_with};

// ---------------------------------------------------------------------------
// Text waits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn text_wait_resolves_when_the_marker_appears() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let p = sh(
        &registry,
        "echo cloning; sleep 0.2; echo 'SETUP SUCCESS'; exec sleep 30",
    );

    let started = Instant::now();
    let ready = with_timeout(p.wait_for_text_within("SETUP SUCCESS", Some(GENEROUS))).await?;
    assert!(started.elapsed() >= Duration::from_millis(150));

    assert_eq!(ready.command_line(), p.command_line());
    assert!(p.is_live(), "resolving a wait does not stop the process");
    assert_eq!(
        p.output().stdout_chunks(),
        &["cloning\n".to_string(), "SETUP SUCCESS\n".to_string()]
    );

    p.halt(None);
    with_timeout(p.wait_for_exit()).await;
    Ok(())
}

#[tokio::test]
async fn text_wait_sees_output_without_a_trailing_newline() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let p = sh(&registry, "printf 'SETUP SUCCESS'; exec sleep 30");

    with_timeout(p.wait_for_text_within("SETUP SUCCESS", Some(GENEROUS))).await?;
    assert_eq!(p.stdout(), "SETUP SUCCESS");
    assert!(p.is_live());

    p.halt(None);
    with_timeout(p.wait_for_exit()).await;
    Ok(())
}

#[tokio::test]
async fn escape_sequences_split_across_writes_are_still_scrubbed() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let p = sh(
        &registry,
        r"printf 'status: [3'; sleep 0.1; printf '2mgreen[0m'; exec sleep 30",
    );

    with_timeout(p.wait_for_text_within("green", Some(GENEROUS))).await?;
    assert_eq!(p.stdout(), "status: green");
    assert!(p.output().stdout_chunks().len() >= 2, "published as it arrived");

    p.halt(None);
    with_timeout(p.wait_for_exit()).await;
    Ok(())
}

#[tokio::test]
async fn text_wait_times_out_and_leaves_the_process_running() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let p = sh(&registry, "echo booting; exec sleep 30");

    let err = with_timeout(p.wait_for_text_within("never printed", Some(SHORT)))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    let message = err.to_string();
    assert!(message.contains("never printed"), "message: {message}");
    assert!(message.contains(p.command_line()), "message: {message}");
    assert!(p.is_live());
    assert!(!p.is_halted());

    p.halt(None);
    assert_eq!(with_timeout(p.wait_for_exit()).await, 143);
    Ok(())
}

#[tokio::test]
async fn text_wait_uses_the_configured_default_timeout() -> TestResult {
    init_tracing();
    let registry = RegistryBuilder::new().text_timeout_ms(80).build();
    let p = sh(&registry, "exec sleep 30");

    let started = Instant::now();
    let err = with_timeout(p.wait_for_text("ready")).await.unwrap_err();
    assert!(matches!(
        err,
        ChildwardenError::WaitTimeout { timeout_ms: 80, .. }
    ));
    assert!(started.elapsed() < Duration::from_secs(2));

    p.halt(None);
    with_timeout(p.wait_for_exit()).await;
    Ok(())
}

#[tokio::test]
async fn text_wait_fails_when_the_process_exits_first() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let p = sh(&registry, "echo something else; sleep 0.1; exit 1");

    let err = with_timeout(p.wait_for_text_within("ready", Some(GENEROUS)))
        .await
        .unwrap_err();

    assert!(err.is_halted_before_match());
    assert!(err.to_string().contains("ready"));
    assert_eq!(with_timeout(p.wait_for_exit()).await, 1);
    Ok(())
}

#[tokio::test]
async fn text_wait_fails_fast_when_halted_mid_wait() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let p = sh(&registry, "exec sleep 30");

    let waiter = p.clone();
    let wait = tokio::spawn(async move { waiter.wait_for_text_within("ready", None).await });

    tokio::time::sleep(SHORT).await;
    p.halt(None);

    let err = with_timeout(wait).await?.unwrap_err();
    assert!(err.is_halted_before_match());
    Ok(())
}

#[tokio::test]
async fn already_buffered_output_satisfies_later_waits() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let p = sh(&registry, "echo 'step one'; echo 'step two'; exec sleep 30");

    p.wait_for_text_within("step two", Some(GENEROUS)).await?;

    // Both markers are already in the buffer; neither wait blocks.
    let started = Instant::now();
    p.wait_for_text_within("step one", Some(SHORT)).await?;
    p.wait_for_text_within("step two", Some(SHORT)).await?;
    assert!(started.elapsed() < SHORT);

    p.halt(None);
    with_timeout(p.wait_for_exit()).await;
    Ok(())
}

#[tokio::test]
async fn text_waits_match_stdout_only() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let p = sh(&registry, "echo 'ready' >&2; exec sleep 30");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        p.output()
            .combined_chunks()
            .iter()
            .any(|c| c.stream == Stream::Stderr)
    );

    let err = p.wait_for_text_within("ready", Some(SHORT)).await.unwrap_err();
    assert!(err.is_timeout());

    p.halt(None);
    with_timeout(p.wait_for_exit()).await;
    Ok(())
}

#[tokio::test]
async fn text_waits_match_scrubbed_output() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let p = sh(
        &registry,
        r"sleep 0.05; printf '\033[32mSETUP\033[0m SUCCESS\n'; exec sleep 30",
    );

    with_timeout(p.wait_for_text_within("SETUP SUCCESS", Some(GENEROUS))).await?;

    p.halt(None);
    with_timeout(p.wait_for_exit()).await;
    Ok(())
}

#[tokio::test]
async fn zero_timeout_waits_indefinitely() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let p = sh(&registry, "sleep 0.2; echo late marker; exec sleep 30");

    with_timeout(p.wait_for_text_within("late marker", Some(Duration::ZERO))).await?;

    p.halt(None);
    with_timeout(p.wait_for_exit()).await;
    Ok(())
}

#[tokio::test]
async fn dropping_a_text_wait_cancels_it() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let p = sh(&registry, "exec sleep 30");

    let waiter = p.clone();
    let wait = tokio::spawn(async move { waiter.wait_for_text_within("ready", None).await });
    tokio::time::sleep(SHORT).await;
    wait.abort();
    assert!(wait.await.unwrap_err().is_cancelled());

    // The process is unaffected by the abandoned wait.
    assert!(p.is_live());
    p.halt(None);
    with_timeout(p.wait_for_exit()).await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Poll waits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn poll_invocations_never_overlap() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let p = sh(&registry, "exec sleep 30");

    // 30ms predicate on a 10ms cadence: most ticks are dropped.
    let check = CountingPredicate::never(Duration::from_millis(30));
    let err = with_timeout(p.wait_for_poll_with(
        check.predicate(),
        Duration::from_millis(10),
        Some(Duration::from_millis(100)),
    ))
    .await
    .unwrap_err();

    assert!(err.is_timeout());
    let calls = check.calls();
    assert!((2..=4).contains(&calls), "calls = {calls}");

    p.halt(None);
    with_timeout(p.wait_for_exit()).await;
    Ok(())
}

#[tokio::test]
async fn poll_wait_resolves_once_the_predicate_succeeds() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let p = sh(&registry, "exec sleep 30");

    let check = CountingPredicate::succeed_after(3, Duration::from_millis(1));
    with_timeout(p.wait_for_poll_with(
        check.predicate(),
        Duration::from_millis(10),
        Some(GENEROUS),
    ))
    .await?;
    let after = check.calls();
    assert!(after >= 3, "calls = {after}");

    // The loop stops with the wait.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(check.calls(), after);

    p.halt(None);
    with_timeout(p.wait_for_exit()).await;
    Ok(())
}

#[tokio::test]
async fn poll_errors_count_as_false() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let p = sh(&registry, "exec sleep 30");

    let check = CountingPredicate::succeed_after(1, Duration::ZERO).failing_first(2);
    with_timeout(p.wait_for_poll_with(
        check.predicate(),
        Duration::from_millis(5),
        Some(GENEROUS),
    ))
    .await?;
    assert!(check.calls() >= 3, "two failures, then success");

    p.halt(None);
    with_timeout(p.wait_for_exit()).await;
    Ok(())
}

#[tokio::test]
async fn poll_wait_fails_when_the_process_halts_first() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let p = sh(&registry, "sleep 0.1");

    let check = CountingPredicate::never(Duration::ZERO);
    let err = with_timeout(p.wait_for_poll_with(
        check.predicate(),
        Duration::from_millis(10),
        Some(GENEROUS),
    ))
    .await
    .unwrap_err();

    assert!(err.is_halted_before_match());
    let message = err.to_string();
    assert!(message.contains("poll predicate (every 10ms)"), "message: {message}");
    assert!(!message.contains("closure"), "message: {message}");
    Ok(())
}

#[tokio::test]
async fn poll_wait_observes_a_file_written_by_the_child() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("ready.flag");
    let registry = ProcessRegistry::new();
    let p = sh_with(
        &registry,
        r#"sleep 0.1; touch "$FILE"; exec sleep 30"#,
        ProcessOptionsBuilder::new()
            .env("FILE", &marker.to_string_lossy())
            .build(),
    );

    let check = marker.clone();
    with_timeout(p.wait_for_poll_with(
        move || {
            let check = check.clone();
            async move { Ok::<bool, anyhow::Error>(tokio::fs::try_exists(&check).await?) }
        },
        Duration::from_millis(10),
        Some(GENEROUS),
    ))
    .await?;
    assert!(marker.exists());

    p.halt(None);
    with_timeout(p.wait_for_exit()).await;
    Ok(())
}

#[tokio::test]
async fn poll_wait_uses_configured_defaults() -> TestResult {
    init_tracing();
    let registry = RegistryBuilder::new()
        .poll_interval_ms(20)
        .poll_timeout_ms(100)
        .build();
    let p = sh(&registry, "exec sleep 30");

    let check = CountingPredicate::never(Duration::ZERO);
    let err = with_timeout(p.wait_for_poll(check.predicate()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ChildwardenError::WaitTimeout { timeout_ms: 100, .. }
    ));
    let calls = check.calls();
    assert!((3..=7).contains(&calls), "calls = {calls}");

    p.halt(None);
    with_timeout(p.wait_for_exit()).await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Exit waits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_exit_waits_all_observe_the_same_code() -> TestResult {
    init_tracing();
    let registry = ProcessRegistry::new();
    let p = sh(&registry, "sleep 0.1; exit 42");

    let waits: Vec<_> = (0..3)
        .map(|_| {
            let p = p.clone();
            tokio::spawn(async move { p.wait_for_exit().await })
        })
        .collect();

    for wait in waits {
        assert_eq!(with_timeout(wait).await?, 42);
    }
    Ok(())
}
