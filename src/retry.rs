//! Transport retry wrapper with bounded exponential backoff.
//!
//! [`with_retry`] runs a zero-argument async operation, classifies each
//! failure with [`classify`], and re-runs the operation only for
//! [`FailureClass::Transient`] failures while the budget in
//! [`BackoffConfig`] lasts. Non-transient failures surface on the spot.

use crate::backend::BackoffConfig;
use crate::PipelineError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Type alias for the callback invoked before each retry.
///
/// Arguments: `(attempt_number, delay_before_retry, reason_for_retry)`.
pub type RetryCallback<'a> = Option<&'a mut (dyn FnMut(u32, Duration, &str) + Send)>;

/// Whether a failure is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Overload, internal error, timeout, dropped connection or stream.
    Transient,
    /// Bad request, auth failure, cancellation, malformed output, etc.
    Fatal,
}

/// Classify a [`PipelineError`] using the statuses in `config`.
///
/// Classification is by error variant, never by message text.
pub fn classify(error: &PipelineError, config: &BackoffConfig) -> FailureClass {
    let transient = match error {
        PipelineError::HttpError { status, .. } => config.retryable_statuses.contains(status),
        PipelineError::Timeout(_) | PipelineError::StreamInterrupted(_) => true,
        // a request error with no status means the peer went away mid-exchange
        PipelineError::Request(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.is_body()
                || (e.is_request() && e.status().is_none())
        }
        _ => false,
    };
    if transient {
        FailureClass::Transient
    } else {
        FailureClass::Fatal
    }
}

/// A retry loop that gave up, either on a fatal error or an exhausted budget.
#[derive(Debug, Error)]
#[error("{source} (after {attempts} attempt(s))")]
pub struct RetryError {
    /// Number of times the operation was invoked.
    pub attempts: u32,
    /// The last error observed.
    #[source]
    pub source: PipelineError,
}

impl RetryError {
    /// Classification of the final error.
    pub fn class(&self, config: &BackoffConfig) -> FailureClass {
        classify(&self.source, config)
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|c| c.load(Ordering::Relaxed))
}

/// Run `operation` with transport-level retry and exponential backoff.
///
/// Returns the first success, or a [`RetryError`] carrying the number of
/// invocations and the last error. A fatal error is returned after a single
/// invocation with no delay. `on_retry` is called before every backoff sleep.
///
/// ```
/// use script_pipeline::backend::BackoffConfig;
/// use script_pipeline::retry::with_retry;
/// use script_pipeline::PipelineError;
///
/// # tokio_test::block_on(async {
/// let config = BackoffConfig::none();
/// let result = with_retry(&config, None, None, || async {
///     Ok::<_, PipelineError>(42)
/// })
/// .await;
/// assert_eq!(result.unwrap(), 42);
/// # });
/// ```
pub async fn with_retry<T, F, Fut>(
    config: &BackoffConfig,
    cancel: Option<&AtomicBool>,
    mut on_retry: RetryCallback<'_>,
    mut operation: F,
) -> std::result::Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    let mut attempts: u32 = 0;

    loop {
        if is_cancelled(cancel) {
            return Err(RetryError {
                attempts,
                source: PipelineError::Cancelled,
            });
        }

        attempts += 1;
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let retries_used = attempts - 1;
        if classify(&error, config) == FailureClass::Fatal || retries_used >= config.max_retries {
            return Err(RetryError {
                attempts,
                source: error,
            });
        }

        let delay = match &error {
            PipelineError::HttpError {
                retry_after: Some(ra),
                ..
            } if config.respect_retry_after => *ra,
            _ => config.delay_for_attempt(retries_used),
        };

        let reason = error.to_string();
        tracing::warn!(
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            reason = %reason,
            "transient transport failure, backing off"
        );
        if let Some(ref mut cb) = on_retry {
            cb(attempts, delay, &reason);
        }

        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use tokio_test::{assert_err, assert_ok};

    fn fast(max_retries: u32) -> BackoffConfig {
        BackoffConfig::standard().with_retries(max_retries, Duration::from_millis(1))
    }

    fn overloaded() -> PipelineError {
        PipelineError::HttpError {
            status: 503,
            body: "overloaded".into(),
            retry_after: None,
        }
    }

    #[test]
    fn test_classify_statuses() {
        let config = BackoffConfig::standard();
        assert_eq!(classify(&overloaded(), &config), FailureClass::Transient);
        let internal = PipelineError::HttpError {
            status: 500,
            body: String::new(),
            retry_after: None,
        };
        assert_eq!(classify(&internal, &config), FailureClass::Transient);
        let bad_request = PipelineError::HttpError {
            status: 400,
            body: "bad".into(),
            retry_after: None,
        };
        assert_eq!(classify(&bad_request, &config), FailureClass::Fatal);
        let unauthorized = PipelineError::HttpError {
            status: 401,
            body: "no key".into(),
            retry_after: None,
        };
        assert_eq!(classify(&unauthorized, &config), FailureClass::Fatal);
    }

    #[test]
    fn test_classify_timeouts_and_streams() {
        let config = BackoffConfig::standard();
        assert_eq!(
            classify(&PipelineError::Timeout("slow".into()), &config),
            FailureClass::Transient
        );
        assert_eq!(
            classify(&PipelineError::StreamInterrupted("eof".into()), &config),
            FailureClass::Transient
        );
        assert_eq!(classify(&PipelineError::Cancelled, &config), FailureClass::Fatal);
        // message text is never consulted
        assert_eq!(
            classify(&PipelineError::Other("timeout".into()), &config),
            FailureClass::Fatal
        );
    }

    #[tokio::test]
    async fn test_classify_dropped_connection_transient() {
        let (base_url, _) = crate::test_support::raw_http_server(None).await;
        let err = crate::test_support::local_client()
            .post(format!("{}/api/generate", base_url))
            .body("{}")
            .send()
            .await
            .unwrap_err();
        assert!(err.status().is_none());
        let config = BackoffConfig::standard();
        assert_eq!(
            classify(&PipelineError::Request(err), &config),
            FailureClass::Transient
        );
    }

    #[tokio::test]
    async fn test_classify_malformed_url_fatal() {
        let err = reqwest::Client::new()
            .get("http://[::1")
            .send()
            .await
            .unwrap_err();
        assert!(err.is_builder());
        assert_eq!(
            classify(&PipelineError::Request(err), &BackoffConfig::standard()),
            FailureClass::Fatal
        );
    }

    #[tokio::test]
    async fn test_transient_twice_then_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(2), None, None, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(overloaded())
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(assert_ok!(result), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_never_retried() {
        let calls = AtomicU32::new(0);
        let result: std::result::Result<(), _> = with_retry(&fast(5), None, None, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(PipelineError::HttpError {
                    status: 401,
                    body: "unauthorized".into(),
                    retry_after: None,
                })
            }
        })
        .await;
        let err = assert_err!(result);
        assert_eq!(err.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: std::result::Result<(), _> = with_retry(&fast(2), None, None, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(PipelineError::Timeout(format!("attempt {}", n))) }
        })
        .await;
        let err = assert_err!(result);
        assert_eq!(err.attempts, 3);
        assert!(matches!(err.source, PipelineError::Timeout(ref m) if m == "attempt 2"));
        assert_eq!(err.class(&fast(2)), FailureClass::Transient);
    }

    #[tokio::test]
    async fn test_zero_retries_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: std::result::Result<(), _> = with_retry(&fast(0), None, None, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(overloaded()) }
        })
        .await;
        assert_eq!(assert_err!(result).attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_on_retry_sees_doubling_delays() {
        let mut seen = Vec::new();
        let mut on_retry = |attempt: u32, delay: Duration, _reason: &str| {
            seen.push((attempt, delay));
        };
        let config = BackoffConfig::standard().with_retries(3, Duration::from_millis(2));
        let _: std::result::Result<(), _> =
            with_retry(&config, None, Some(&mut on_retry), || async { Err(overloaded()) }).await;
        assert_eq!(
            seen,
            vec![
                (1, Duration::from_millis(2)),
                (2, Duration::from_millis(4)),
                (3, Duration::from_millis(8)),
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_after_overrides_delay() {
        let mut delays = Vec::new();
        let mut on_retry = |_: u32, delay: Duration, _: &str| delays.push(delay);
        let calls = AtomicU32::new(0);
        let _ = with_retry(&fast(1), None, Some(&mut on_retry), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(PipelineError::HttpError {
                        status: 429,
                        body: "slow down".into(),
                        retry_after: Some(Duration::from_millis(3)),
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert_eq!(delays, vec![Duration::from_millis(3)]);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let cancel = AtomicBool::new(true);
        let calls = AtomicU32::new(0);
        let result: std::result::Result<(), _> =
            with_retry(&fast(3), Some(&cancel), None, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;
        let err = assert_err!(result);
        assert!(matches!(err.source, PipelineError::Cancelled));
        assert_eq!(err.attempts, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
