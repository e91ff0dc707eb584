use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type CheckFuture = Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send>>;

/// A poll predicate that counts its invocations.
///
/// Each call sleeps for `delay`, then returns `true` once it has been called
/// `succeed_after` times (never, if `None`).
#[derive(Clone)]
pub struct CountingPredicate {
    calls: Arc<AtomicUsize>,
    delay: Duration,
    succeed_after: Option<usize>,
    fail_first: usize,
}

impl CountingPredicate {
    /// A predicate that never succeeds.
    pub fn never(delay: Duration) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            delay,
            succeed_after: None,
            fail_first: 0,
        }
    }

    /// A predicate that returns `true` on its `n`th call.
    pub fn succeed_after(n: usize, delay: Duration) -> Self {
        Self {
            succeed_after: Some(n),
            ..Self::never(delay)
        }
    }

    /// Make the first `n` calls return an error instead of `false`.
    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The closure to hand to `wait_for_poll`.
    pub fn predicate(&self) -> impl FnMut() -> CheckFuture + Send + 'static {
        let this = self.clone();
        move || {
            let this = this.clone();
            Box::pin(async move {
                let n = this.calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(this.delay).await;
                if n <= this.fail_first {
                    anyhow::bail!("check failure #{n}");
                }
                Ok(this.succeed_after.is_some_and(|target| n >= target))
            }) as CheckFuture
        }
    }
}
