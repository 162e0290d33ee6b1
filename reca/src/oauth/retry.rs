//! Single-retry policy for provider calls.

use std::future::Future;
use std::time::Duration;

use super::errors::ProviderResult;

/// Pause before the one permitted retry
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Run `call`, retrying at most once after `backoff` when the failure is transient.
///
/// Non-transient failures (a 4xx rejection of the code, a malformed body) are
/// returned immediately.
pub async fn with_retry<T, F, Fut>(operation: &str, backoff: Duration, mut call: F) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    match call().await {
        Ok(value) => Ok(value),
        Err(err) if err.is_transient() => {
            tracing::warn!(operation, error = %err, backoff_ms = backoff.as_millis() as u64, "Provider call failed, retrying once");
            tokio::time::sleep(backoff).await;
            call().await
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::ProviderError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_transient_failure_retried_once() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result = with_retry("exchange", Duration::from_millis(1), || async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ProviderError::Timeout)
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_second_failure() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result: ProviderResult<()> = with_retry("exchange", Duration::from_millis(1), || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Transport("connection reset".into()))
        })
        .await;

        assert!(matches!(result, Err(ProviderError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result: ProviderResult<()> = with_retry("exchange", Duration::from_millis(1), || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Rejected { status: 400, body: "invalid_grant".into() })
        })
        .await;

        assert!(matches!(result, Err(ProviderError::Rejected { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
