// ── Retry executor ──
//
// Bounded exponential backoff around a single remote call. The retry
// decision is driven entirely by the error's `ErrorClass`; fatal errors
// come back untouched, exhausted retries come back with the last error.

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use orbit_api::ErrorClass;
use tracing::warn;

/// Errors the executor can classify.
pub trait Classify {
    fn class(&self) -> ErrorClass;

    /// Server-requested minimum wait before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Classify for orbit_api::Error {
    fn class(&self) -> ErrorClass {
        orbit_api::Error::class(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(Duration::from_secs(*retry_after_secs)),
            _ => None,
        }
    }
}

/// Backoff and retry-decision settings. Not mutated at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Upper bound of the +/- jitter added to each delay.
    pub jitter: Duration,
    pub max_delay: Duration,
    pub retryable: HashSet<ErrorClass>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            jitter: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            retryable: default_retryable(),
        }
    }
}

/// Connection, timeout, rate-limit and 5xx failures.
pub fn default_retryable() -> HashSet<ErrorClass> {
    [
        ErrorClass::Connection,
        ErrorClass::Timeout,
        ErrorClass::RateLimited,
        ErrorClass::Server,
    ]
    .into_iter()
    .collect()
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn is_retryable(&self, class: ErrorClass) -> bool {
        self.retryable.contains(&class)
    }

    /// Delay before the retry that follows attempt `attempt` (0-based).
    ///
    /// `delay = min(base * 2^attempt, max) + jitter`, where the jitter is
    /// deterministic per attempt and lies within `[-jitter, +jitter]`. The
    /// result is clamped to `[0, max_delay]`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
        let base = self.base_delay.as_secs_f64() * 2.0_f64.powi(exponent);
        let max = self.max_delay.as_secs_f64();
        let capped = base.min(max);

        let spread = (f64::from(attempt) * 7.3).sin();
        let with_jitter = capped + self.jitter.as_secs_f64() * spread;

        Duration::from_secs_f64(with_jitter.clamp(0.0, max))
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// Non-retryable error, returned unchanged on first sight.
    Fatal(E),
    /// Retryable error that persisted through every attempt.
    Exhausted {
        operation: &'static str,
        attempts: u32,
        last: E,
    },
}

impl<E> RetryFailure<E> {
    /// The underlying error, whichever way the operation gave up.
    pub fn error(&self) -> &E {
        match self {
            Self::Fatal(err) | Self::Exhausted { last: err, .. } => err,
        }
    }
}

/// Runs operations under a [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation`, retrying retryable failures with backoff.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt_fn: F,
    ) -> Result<T, RetryFailure<E>>
    where
        E: Classify + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            let err = match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            attempt += 1;

            let class = err.class();
            if !self.policy.is_retryable(class) {
                return Err(RetryFailure::Fatal(err));
            }
            if attempt >= max_attempts {
                warn!(operation, attempts = attempt, error = %err, "giving up after retries");
                return Err(RetryFailure::Exhausted {
                    operation,
                    attempts: attempt,
                    last: err,
                });
            }

            let mut delay = self.policy.backoff(attempt - 1);
            if let Some(hint) = err.retry_after() {
                delay = delay.max(hint.min(self.policy.max_delay));
            }
            warn!(
                operation,
                attempt,
                ?class,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "transient failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
