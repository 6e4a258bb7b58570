// Bounded retry for fallible async operations

use std::{fmt::Display, future::Future, time::Duration};

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    // Attempts made after the first one fails
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    // Fixed pause between attempts
    #[serde(default)]
    pub retry_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: 0,
        }
    }
}

impl RetryConfig {
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Runs `op` until it succeeds or `config.max_retries` extra attempts have
/// failed, returning the last error. `op` receives the zero-based attempt.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < config.max_retries => {
                attempt += 1;
                warn!(
                    "{} failed: {}. Retrying now ({}/{})",
                    label, e, attempt, config.max_retries
                );
                if config.retry_delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(config.retry_delay_ms)).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_retry_until_success() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::default();

        let res: Result<u32, String> = with_retry(&config, "op", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(format!("boom {attempt}"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(assert_ok!(res), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_retries: 3,
            retry_delay_ms: 1,
        };

        let res: Result<(), String> = with_retry(&config, "op", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("down on attempt {attempt}")) }
        })
        .await;

        assert_eq!(assert_err!(res), "down on attempt 3");
        assert_eq!(calls.load(Ordering::SeqCst), config.total_attempts());
    }

    #[tokio::test]
    async fn test_no_retries() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_retries: 0,
            retry_delay_ms: 0,
        };

        let res: Result<(), &str> = with_retry(&config, "op", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("down") }
        })
        .await;

        assert_err!(res);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
