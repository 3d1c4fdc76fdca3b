use crate::error::{LedgerError, Result};
use std::future::Future;

/// Re-runs `attempt` while it loses compare-and-set races, at most
/// `max_retries` extra times. Every other outcome is returned as is.
pub(crate) async fn with_retry<T, F, Fut>(op: &'static str, max_retries: u32, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Err(LedgerError::RetryableConflict) if retries < max_retries => {
                retries += 1;
                tracing::debug!(op, retries, "lost write race, retrying");
                tokio::task::yield_now().await;
            }
            Err(LedgerError::RetryableConflict) => {
                tracing::warn!(op, retries, "giving up after repeated write conflicts");
                return Err(LedgerError::RetryableConflict);
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry("test", 3, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LedgerError::RetryableConflict)
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_surfaces_conflict_when_exhausted() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = with_retry("test", 2, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::RetryableConflict)
        })
        .await;
        assert!(matches!(result, Err(LedgerError::RetryableConflict)));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_terminal_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = with_retry("test", 5, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::Unauthorized)
        })
        .await;
        assert!(matches!(result, Err(LedgerError::Unauthorized)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
