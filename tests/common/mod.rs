#![allow(dead_code)]

use std::time::Duration;

pub use childwarden_test_utils::{init_tracing, with_timeout};

pub const SHORT: Duration = Duration::from_millis(50);
pub const GENEROUS: Duration = Duration::from_secs(5);

/// Error type for `-> TestResult` tests.
pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Whether `pid` still names a process we could signal.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_ok()
}
