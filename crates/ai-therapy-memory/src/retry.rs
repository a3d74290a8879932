//! Bounded exponential-backoff retry for remote calls.
//!
//! Failures are classified by their text: quota/credit exhaustion is terminal
//! and surfaced immediately, errors matching none of the transient markers are
//! surfaced immediately, and everything else is retried with a deterministic
//! backoff schedule.

use crate::error::RemoteError;
use log::{info, warn};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Substrings that mark a failure as quota or credit exhaustion.
const QUOTA_EXHAUSTED_MARKERS: &[&str] = &[
    "quota",
    "insufficient_quota",
    "quota_exceeded",
    "billing",
    "payment",
    "credit",
    "usage limit",
    "exceeded your current quota",
    "insufficient funds",
];

/// Substrings that mark a failure as transient.
const DEFAULT_RETRYABLE_MARKERS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "429",
    "500",
    "502",
    "503",
    "504",
    "timeout",
    "connection",
    "network",
];

/// Retry behaviour for a remote operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling for any single delay.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub backoff_factor: f64,
    /// Lower-case substrings that make an error retryable.
    pub retryable_errors: Vec<String>,
}

impl Default for RetryConfig {
    /// Default retry settings for API calls.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
            backoff_factor: 2.0,
            retryable_errors: DEFAULT_RETRYABLE_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.base_delay.min(self.max_delay);
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        if !delay.is_finite() || delay >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay.max(0.0))
    }

    /// True when the error text matches any transient marker.
    pub fn is_retryable(&self, message: &str) -> bool {
        let lower = message.to_lowercase();
        self.retryable_errors
            .iter()
            .any(|marker| lower.contains(&marker.to_lowercase()))
    }
}

/// True when the error text signals quota or credit exhaustion.
pub fn is_quota_exhausted(message: &str) -> bool {
    let lower = message.to_lowercase();
    QUOTA_EXHAUSTED_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Run `operation` until it succeeds, fails terminally, or exhausts retries.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut operation: F,
    config: &RetryConfig,
    label: &str,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut last_message = String::new();
    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = config.delay_for_attempt(attempt);
            info!(
                "retrying {label} (attempt={attempt}/{}, delay_ms={})",
                config.max_retries,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    info!("{label} succeeded after {attempt} retries");
                }
                return Ok(value);
            }
            Err(err) => {
                let message = err.to_string();
                if is_quota_exhausted(&message) {
                    warn!("credit exhaustion detected for {label}: {message}");
                    return Err(RemoteError::QuotaExhausted {
                        operation: label.to_string(),
                        message,
                    });
                }
                if !config.is_retryable(&message) {
                    warn!("non-retryable error for {label}: {message}");
                    return Err(RemoteError::NonRetryable {
                        operation: label.to_string(),
                        message,
                    });
                }
                warn!(
                    "retryable error for {label} (attempt={}/{}): {message}",
                    attempt + 1,
                    config.max_retries + 1
                );
                last_message = message;
            }
        }
    }

    Err(RemoteError::RetriesExhausted {
        operation: label.to_string(),
        retries: config.max_retries,
        message: last_message,
    })
}

#[cfg(test)]
mod tests {
    use super::{RetryConfig, is_quota_exhausted, retry_with_backoff};
    use crate::error::RemoteError;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            ..RetryConfig::default()
        }
    }

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(120));
        assert_eq!(config.delay_for_attempt(500), Duration::from_secs(120));
    }

    #[test]
    fn classifies_error_text() {
        let config = RetryConfig::default();
        assert!(config.is_retryable("API error (status 503): Service Unavailable"));
        assert!(config.is_retryable("Rate Limit reached"));
        assert!(!config.is_retryable("API error (status 401): invalid key"));
        assert!(is_quota_exhausted(
            "You exceeded your current quota, please check your plan"
        ));
        assert!(is_quota_exhausted("insufficient_quota"));
        assert!(!is_quota_exhausted("status 500"));
    }

    #[test]
    fn bare_quota_wording_counts_as_exhaustion() {
        assert!(is_quota_exhausted("Quota exceeded for embeddings"));
        assert!(is_quota_exhausted("monthly quota reached"));
        assert!(is_quota_exhausted("Insufficient funds on account"));
    }

    #[tokio::test]
    async fn quota_wording_beats_transient_status() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = retry_with_backoff(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(RemoteError::request("429: quota exceeded"))
                }
            },
            &fast_config(3),
            "embed",
        )
        .await
        .expect_err("quota");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, RemoteError::QuotaExhausted { .. }));
        assert!(err.is_quota_exhausted());
    }

    #[tokio::test]
    async fn returns_first_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = retry_with_backoff(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, RemoteError>(7)
                }
            },
            &fast_config(3),
            "test op",
        )
        .await
        .expect("success");
        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn quota_exhaustion_is_never_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = retry_with_backoff(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(RemoteError::request(
                        "status 429: insufficient_quota, check billing",
                    ))
                }
            },
            &fast_config(3),
            "embedding",
        )
        .await
        .unwrap_err();
        assert!(err.is_quota_exhausted());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retryable_error_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = retry_with_backoff(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("status 400: bad request")
                }
            },
            &fast_config(3),
            "chat",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RemoteError::NonRetryable { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_errors_exhaust_retry_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = retry_with_backoff(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("status 503: overloaded")
                }
            },
            &fast_config(2),
            "chat",
        )
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            RemoteError::RetriesExhausted {
                retries, message, ..
            } => {
                assert_eq!(retries, 2);
                assert_eq!(message, "status 503: overloaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn recovers_after_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let value = retry_with_backoff(
            || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("connection reset")
                    } else {
                        Ok("ok")
                    }
                }
            },
            &fast_config(3),
            "chat",
        )
        .await
        .expect("recovered");
        assert_eq!(value, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
