// src/interval.rs

//! Single-flight interval loop.
//!
//! [`spawn_interval`] invokes an async callback on a fixed cadence, but never
//! lets two invocations overlap: if the previous call is still running when
//! the next tick fires, that tick is dropped (not queued). Poll-based waits
//! build on this so a slow predicate cannot pile up behind itself.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::trace;

/// Handle to a running interval loop.
///
/// Dropping the handle cancels the loop and any in-flight invocation.
#[derive(Debug)]
pub struct IntervalHandle {
    ticker: JoinHandle<()>,
    invocations: Arc<AtomicU64>,
}

impl IntervalHandle {
    /// Stop the loop. An invocation that is currently running is aborted.
    pub fn cancel(&self) {
        self.ticker.abort();
    }

    /// Number of callback invocations started so far.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.ticker.is_finished()
    }
}

impl Drop for IntervalHandle {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

/// Start invoking `callback` every `period`, skipping ticks while a previous
/// invocation is still in flight.
///
/// The first invocation happens immediately. `period` must be non-zero.
pub fn spawn_interval<F, Fut>(period: Duration, mut callback: F) -> IntervalHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let invocations = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&invocations);

    let ticker = tokio::spawn(async move {
        let mut ticks = interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Aborted together with the ticker so cancellation reaches the callback.
        let mut in_flight: Option<AbortOnDrop> = None;

        loop {
            ticks.tick().await;

            if let Some(running) = &in_flight {
                if !running.0.is_finished() {
                    trace!("interval tick dropped; previous invocation still running");
                    continue;
                }
            }

            counter.fetch_add(1, Ordering::Relaxed);
            in_flight = Some(AbortOnDrop(tokio::spawn(callback())));
        }
    });

    IntervalHandle {
        ticker,
        invocations,
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
