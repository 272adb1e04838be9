//! Shared job-loop types and cancellable waits.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use vigil_api::{Account, ApiClient};
use vigil_store::StateStore;

/// A classified failure after which no further calls for the account are
/// meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// Credential expired (HTTP 401 or equivalent body code).
    TokenExpired,
    /// Credential forbidden (HTTP 403).
    Forbidden,
}

impl Terminal {
    /// Reason string persisted with the pause record.
    pub fn reason(&self) -> &'static str {
        match self {
            Terminal::TokenExpired => "Token Expired (401)",
            Terminal::Forbidden => "Forbidden (403)",
        }
    }
}

impl std::fmt::Display for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

/// Why a job loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobExit {
    /// The loop observed cancellation at a suspension point.
    Cancelled,
    /// The loop hit a terminal condition; the supervisor must pause the
    /// account and cancel its siblings.
    Terminal(Terminal),
}

/// Everything one job loop needs: the account identity, its API client,
/// the durable store, and the account-level cancel signal.
#[derive(Clone)]
pub struct JobContext {
    pub account: Account,
    pub api: ApiClient,
    pub store: Arc<StateStore>,
    pub cancel: watch::Receiver<bool>,
}

/// Sleep for `duration`, waking early on cancellation.
///
/// Returns `false` if the loop should exit instead of continuing.
pub async fn sleep_cancellable(cancel: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    if *cancel.borrow() {
        return false;
    }

    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            biased;
            changed = cancel.changed() => {
                match changed {
                    Ok(()) if *cancel.borrow() => return false,
                    Ok(()) => continue,
                    // Sender dropped: the supervisor is gone, stop too.
                    Err(_) => return false,
                }
            }
            _ = &mut sleep => return true,
        }
    }
}

/// Sleep until a wall-clock instant, waking early on cancellation.
pub async fn sleep_until(cancel: &mut watch::Receiver<bool>, at: DateTime<Utc>) -> bool {
    let now = Utc::now();
    let duration = (at - now).to_std().unwrap_or(Duration::ZERO);
    sleep_cancellable(cancel, duration).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_reasons() {
        assert_eq!(Terminal::TokenExpired.reason(), "Token Expired (401)");
        assert_eq!(Terminal::Forbidden.reason(), "Forbidden (403)");
    }

    #[tokio::test]
    async fn test_sleep_cancellable_completes() {
        let (_tx, mut rx) = watch::channel(false);
        assert!(sleep_cancellable(&mut rx, Duration::from_millis(1)).await);
    }

    #[tokio::test]
    async fn test_sleep_cancellable_observes_cancel() {
        let (tx, mut rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            sleep_cancellable(&mut rx, Duration::from_secs(3600)).await
        });
        tx.send(true).unwrap();

        assert!(!handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_sleep_cancellable_already_cancelled() {
        let (_tx, mut rx) = watch::channel(true);
        assert!(!sleep_cancellable(&mut rx, Duration::from_secs(3600)).await);
    }

    #[tokio::test]
    async fn test_sleep_until_past_instant_returns_immediately() {
        let (_tx, mut rx) = watch::channel(false);
        let past = Utc::now() - chrono::Duration::hours(1);
        assert!(sleep_until(&mut rx, past).await);
    }
}
