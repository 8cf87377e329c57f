//! Cancellation plumbing.
//!
//! A rollout is cancelled by sending `true` on the `watch` channel whose
//! receiver is threaded through every wait.

use std::time::Duration;

use tokio::sync::watch;

/// Receiving half of a cancellation signal. `true` means stop.
pub type Shutdown = watch::Receiver<bool>;

/// A signal that is never cancelled.
pub fn never() -> Shutdown {
    let (_tx, rx) = watch::channel(false);
    rx
}

/// Whether cancellation has been requested.
pub fn is_cancelled(shutdown: &Shutdown) -> bool {
    *shutdown.borrow()
}

/// Resolves once cancellation is requested.
///
/// Never resolves if the sender goes away without cancelling.
pub async fn cancelled(shutdown: &mut Shutdown) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Sleep for `duration` unless cancelled first. Returns `true` if cancelled.
pub async fn sleep_or_cancel(duration: Duration, shutdown: &Shutdown) -> bool {
    let mut shutdown = shutdown.clone();
    if is_cancelled(&shutdown) {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = cancelled(&mut shutdown) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_runs_to_completion_without_cancel() {
        let rx = never();
        let start = tokio::time::Instant::now();
        assert!(!sleep_or_cancel(Duration::from_secs(5), &rx).await);
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_sleep() {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { sleep_or_cancel(Duration::from_secs(3600), &rx).await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn already_cancelled_returns_immediately() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        assert!(is_cancelled(&rx));
        assert!(sleep_or_cancel(Duration::from_secs(3600), &rx).await);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_does_not_cancel() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        assert!(!sleep_or_cancel(Duration::from_millis(10), &rx).await);
    }
}
