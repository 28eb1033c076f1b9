use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::common::error::Cons3rtError;

/// Failure of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    #[error("{operation} failed after {attempts} attempt(s)")]
    Exhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: E,
    },

    #[error("{operation} failed permanently on attempt {attempt}")]
    Aborted {
        operation: String,
        attempt: u32,
        #[source]
        source: E,
    },
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    pub fn source_error(&self) -> &E {
        match self {
            Self::Exhausted { source, .. } | Self::Aborted { source, .. } => source,
        }
    }

    pub fn into_source(self) -> E {
        match self {
            Self::Exhausted { source, .. } | Self::Aborted { source, .. } => source,
        }
    }
}

/// An aborted attempt hands back the crate error unchanged.
impl From<RetryError<Cons3rtError>> for Cons3rtError {
    fn from(error: RetryError<Cons3rtError>) -> Self {
        match error {
            RetryError::Exhausted {
                operation,
                attempts,
                source,
            } => Self::RetryExhausted {
                operation,
                attempts,
                source: Box::new(source),
            },
            RetryError::Aborted { source, .. } => source,
        }
    }
}

/// How a failed attempt should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Abort,
}

/// A named, repeatable async operation.
pub struct RetryableOperation<F> {
    name: String,
    operation: F,
}

impl<F> RetryableOperation<F> {
    pub fn new(name: impl Into<String>, operation: F) -> Self {
        Self {
            name: name.into(),
            operation,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Bounded retries with a constant delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(5))
    }
}

impl RetryPolicy {
    /// `max_attempts` is raised to 1 when zero.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: RetryableOperation<F>,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        self.execute_classified(operation, |_| RetryDecision::Retry)
            .await
    }

    /// Like [`RetryPolicy::execute`], but `classify` may mark a failure as
    /// permanent, which ends the loop at once.
    pub async fn execute_classified<T, E, F, Fut, C>(
        &self,
        operation: RetryableOperation<F>,
        classify: C,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
        C: Fn(&E) -> RetryDecision,
    {
        let RetryableOperation {
            name,
            operation: mut op,
        } = operation;
        let mut attempt = 1;

        loop {
            debug!("{}: attempt {} of {}", name, attempt, self.max_attempts);
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if classify(&error) == RetryDecision::Abort {
                return Err(RetryError::Aborted {
                    operation: name,
                    attempt,
                    source: error,
                });
            }

            if attempt >= self.max_attempts {
                return Err(RetryError::Exhausted {
                    operation: name,
                    attempts: attempt,
                    source: error,
                });
            }

            warn!(
                "{} failed (attempt {} of {}): {}; retrying in {:?}",
                name, attempt, self.max_attempts, error, self.delay
            );
            tokio::time::sleep(self.delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Error, PartialEq)]
    #[error("transient failure {0}")]
    struct Flaky(u32);

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_succeeds_after_two_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let operation = RetryableOperation::new("flaky", move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(Flaky(n))
                } else {
                    Ok("done")
                }
            }
        });

        let result = quick(3).execute(operation).await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_always_failing_stops_at_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let operation = RetryableOperation::new("broken", move || {
            let counter = Arc::clone(&counter);
            async move { Err::<(), _>(Flaky(counter.fetch_add(1, Ordering::SeqCst) + 1)) }
        });

        match quick(3).execute(operation).await {
            Err(RetryError::Exhausted {
                operation,
                attempts,
                source,
            }) => {
                assert_eq!(operation, "broken");
                assert_eq!(attempts, 3);
                assert_eq!(source, Flaky(3));
            }
            other => panic!("Expected Exhausted, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_abort_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let operation = RetryableOperation::new("missing", move || {
            let counter = Arc::clone(&counter);
            async move { Err::<(), _>(Flaky(counter.fetch_add(1, Ordering::SeqCst) + 1)) }
        });

        let result = quick(5)
            .execute_classified(operation, |_| RetryDecision::Abort)
            .await;
        assert!(matches!(result, Err(RetryError::Aborted { attempt: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_constant_between_attempts() {
        let policy = RetryPolicy::new(4, Duration::from_secs(5));
        let start = tokio::time::Instant::now();

        let operation = RetryableOperation::new("slow", || async { Err::<(), _>(Flaky(0)) });
        let _ = policy.execute(operation).await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(15) && elapsed < Duration::from_secs(16));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[test]
    fn test_aborted_retry_unwraps_inner_error() {
        let retry_error = RetryError::Aborted {
            operation: "fetch".to_string(),
            attempt: 1,
            source: Cons3rtError::not_found("artifact", "g:a:1.0"),
        };
        let error: Cons3rtError = retry_error.into();
        assert!(matches!(error, Cons3rtError::NotFound { .. }));
    }

    #[test]
    fn test_exhausted_retry_names_attempts() {
        let retry_error = RetryError::Exhausted {
            operation: "download".to_string(),
            attempts: 3,
            source: Cons3rtError::internal_error("still broken"),
        };
        let error: Cons3rtError = retry_error.into();
        assert!(matches!(error, Cons3rtError::RetryExhausted { attempts: 3, .. }));
        assert_eq!(error.to_string(), "download did not succeed after 3 attempt(s)");
    }
}
