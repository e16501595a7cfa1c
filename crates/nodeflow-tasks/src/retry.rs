use std::future::Future;
use std::time::Duration;

use tracing::warn;

use nodeflow_core::config::RetryConfig;
use nodeflow_core::error::{NodeflowError, Result};

pub(crate) fn is_retryable(e: &NodeflowError) -> bool {
    match e {
        NodeflowError::ProviderRequest(msg) => {
            msg.contains("429")
                || msg.contains("500")
                || msg.contains("502")
                || msg.contains("503")
                || msg.contains("timeout")
                || msg.contains("timed out")
                || msg.contains("connection")
        }
        _ => false,
    }
}

pub(crate) fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // Add jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_retries = config.max_retries;
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) && attempt < max_retries => {
                let backoff = calculate_backoff(attempt, config);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Retrying provider request"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&NodeflowError::ProviderRequest(
            "HTTP 429 Too Many Requests: slow down".into()
        )));
        assert!(is_retryable(&NodeflowError::ProviderRequest(
            "error sending request: connection refused".into()
        )));
        assert!(!is_retryable(&NodeflowError::ProviderRequest(
            "HTTP 401 Unauthorized: bad key".into()
        )));
        assert!(!is_retryable(&NodeflowError::ProviderParse("HTTP 500".into())));
    }

    #[test]
    fn test_backoff_is_capped_with_jitter() {
        let config = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30000,
        };
        let first = calculate_backoff(0, &config).as_millis() as u64;
        assert!((800..=1200).contains(&first));

        let capped = calculate_backoff(20, &config).as_millis() as u64;
        assert!((24000..=36000).contains(&capped));
    }

    #[tokio::test]
    async fn test_with_retry_recovers() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result = with_retry(&fast_config(3), "test", move || async move {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(NodeflowError::ProviderRequest("HTTP 503: busy".into()))
            } else {
                Ok("done")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result: Result<()> = with_retry(&fast_config(2), "test", move || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(NodeflowError::ProviderRequest("HTTP 502: gateway".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_stops_on_permanent_error() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result: Result<()> = with_retry(&fast_config(3), "test", move || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(NodeflowError::ProviderRequest("HTTP 400: bad request".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
