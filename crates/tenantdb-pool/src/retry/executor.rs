//! Bounded retry loop driving an arbitrary fallible async operation

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tenantdb_core::ConnectError;
use tokio::time::Instant;

use super::{BackoffStrategy, RetryClassifier};

/// Observer invoked before each retry sleep with
/// `(attempt_number, error, delay)`; `attempt_number` is 1 for the first retry.
pub type RetryObserver<E> = Arc<dyn Fn(u32, &E, Duration) + Send + Sync>;

/// Configuration for the retry executor
pub struct RetryConfig<E = ConnectError> {
    /// Total tries including the first one (at least 1)
    max_attempts: u32,
    /// Backoff strategy for delays between tries
    backoff: BackoffStrategy,
    /// Transient vs. permanent decision
    classifier: RetryClassifier<E>,
    /// Optional retry observer
    on_retry: Option<RetryObserver<E>>,
}

impl<E> RetryConfig<E> {
    /// Create a retry configuration with an explicit classifier
    ///
    /// `max_attempts` is raised to 1 when zero.
    pub fn with_classifier(
        max_attempts: u32,
        backoff: BackoffStrategy,
        classifier: RetryClassifier<E>,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            classifier,
            on_retry: None,
        }
    }

    /// Replace the retry classifier
    pub fn classifier(mut self, classifier: RetryClassifier<E>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Set the retry observer
    pub fn on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(u32, &E, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &BackoffStrategy {
        &self.backoff
    }

    pub fn is_retryable(&self, error: &E) -> bool {
        self.classifier.is_retryable(error)
    }

    pub(crate) fn observer(&self) -> Option<&RetryObserver<E>> {
        self.on_retry.as_ref()
    }
}

impl RetryConfig<ConnectError> {
    /// Create a retry configuration using the default classifier
    pub fn new(max_attempts: u32, backoff: BackoffStrategy) -> Self {
        Self::with_classifier(max_attempts, backoff, RetryClassifier::default_policy())
    }
}

impl Default for RetryConfig<ConnectError> {
    fn default() -> Self {
        Self::new(3, BackoffStrategy::default())
    }
}

impl<E> Clone for RetryConfig<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            backoff: self.backoff.clone(),
            classifier: self.classifier.clone(),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("classifier", &self.classifier)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

/// A successful run of [`with_retry`]
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome<T> {
    pub value: T,
    /// Tries made, including the successful one
    pub attempts: u32,
    pub elapsed: Duration,
}

/// A failed run of [`with_retry`], carrying the last error seen
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFailure<E> {
    pub error: E,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Run `operation` until it succeeds, fails permanently or runs out of attempts.
///
/// Delays between tries come from the configured [`BackoffStrategy`] and are
/// awaited with `tokio::time::sleep`, so other tasks keep running. Dropping
/// the returned future cancels any pending sleep.
pub async fn with_retry<T, E, F, Fut>(
    mut operation: F,
    config: &RetryConfig<E>,
) -> Result<RetryOutcome<T>, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let started = Instant::now();
    let max_attempts = config.max_attempts();
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => {
                return Ok(RetryOutcome {
                    value,
                    attempts: attempt + 1,
                    elapsed: started.elapsed(),
                });
            }
            Err(error) => {
                let is_last = attempt + 1 >= max_attempts;
                if is_last || !config.is_retryable(&error) {
                    if !is_last {
                        tracing::debug!(error = %error, attempt = attempt + 1, "non-retryable error");
                    }
                    return Err(RetryFailure {
                        error,
                        attempts: attempt + 1,
                        elapsed: started.elapsed(),
                    });
                }

                let delay = config.backoff().calculate_delay(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retrying after transient failure"
                );
                if let Some(observer) = config.observer() {
                    observer(attempt + 1, &error, delay);
                }

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
