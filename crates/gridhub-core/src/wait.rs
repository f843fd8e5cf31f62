//! Bounded condition polling.
//!
//! Several places in the hub need to wait for an external condition
//! (a session vacating a node, mostly) without hanging forever. The
//! helper here makes the budget explicit: a fixed interval, a maximum
//! number of attempts, and a boolean result telling the caller whether
//! the condition was observed or the budget ran out.

use std::future::Future;
use std::time::Duration;

/// Poll `condition` until it returns `true` or `max_attempts` checks
/// have failed, sleeping `interval` between checks.
///
/// The condition is checked before the first sleep, so a condition
/// that already holds costs no wait at all. Returns `true` if the
/// condition was observed, `false` if the budget was exhausted —
/// callers decide whether giving up is an error or a
/// proceed-anyway situation.
pub async fn wait_until<F, Fut>(interval: Duration, max_attempts: u32, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 1..=max_attempts {
        if condition().await {
            return true;
        }
        if attempt < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn returns_immediately_when_condition_already_holds() {
        let checks = Arc::new(AtomicU32::new(0));
        let counter = checks.clone();
        let ok = wait_until(Duration::from_secs(60), 5, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }
        })
        .await;
        assert!(ok);
        assert_eq!(checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let checks = Arc::new(AtomicU32::new(0));
        let counter = checks.clone();
        let ok = wait_until(Duration::from_millis(1), 4, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                false
            }
        })
        .await;
        assert!(!ok);
        assert_eq!(checks.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn observes_condition_that_becomes_true_mid_budget() {
        let checks = Arc::new(AtomicU32::new(0));
        let counter = checks.clone();
        let ok = wait_until(Duration::from_millis(1), 10, move || {
            let counter = counter.clone();
            async move { counter.fetch_add(1, Ordering::SeqCst) >= 2 }
        })
        .await;
        assert!(ok);
        assert_eq!(checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_attempts_means_immediate_give_up() {
        let ok = wait_until(Duration::from_millis(1), 0, || async { true }).await;
        assert!(!ok);
    }
}
