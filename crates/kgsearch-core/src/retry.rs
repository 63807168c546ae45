//! Exponential backoff for store adapter calls (§5's back-pressure policy,
//! §7's `StoreTransportError` handling). LLM calls are not retried here:
//! per §7 they downgrade on first failure rather than retrying.

use std::future::Future;
use std::time::Duration;

const BASE_DELAY: Duration = Duration::from_millis(100);
const MAX_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRIES: u32 = 2;

/// Calls `attempt` up to three times total (the original call plus two
/// retries), doubling the delay between attempts starting at `BASE_DELAY`
/// and capping at `MAX_DELAY`. Returns the last error if every attempt
/// fails.
pub async fn with_retry<T, F, Fut>(mut attempt: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut delay = BASE_DELAY;
    let mut retries = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if retries >= MAX_RETRIES {
                    return Err(err);
                }
                retries += 1;
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_failures_within_the_retry_budget() {
        let calls = AtomicU32::new(0);
        let result = with_retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(anyhow::anyhow!("transient"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_exhausting_retries() {
        let calls = AtomicU32::new(0);
        let result: anyhow::Result<()> = with_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("persistent")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
