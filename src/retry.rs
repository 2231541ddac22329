/// Retry Module
///
/// Runs one outbound call under a bounded retry policy with exponential
/// backoff and jitter. Failures are classified by the error type itself:
/// only retryable ones are repeated, fatal ones surface on first sight and
/// running out of attempts produces a distinct `Exhausted` error.
///
/// The invoker never logs or swallows the final error; reporting belongs to
/// the caller.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};

use crate::shutdown::Shutdown;

/// Whether repeating a failed call could plausibly succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Retryable,
    Fatal,
}

/// Implemented by error types the invoker can classify.
pub trait Classify {
    fn disposition(&self) -> Disposition;

    /// Server-specified wait before the next attempt, if the error carries one.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Classified result of a single attempt.
#[derive(Debug, PartialEq)]
pub enum Outcome<T, E> {
    Success(T),
    RetryableFailure(E),
    FatalFailure(E),
}

impl<T, E: Classify> Outcome<T, E> {
    pub fn classify(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(error) => match error.disposition() {
                Disposition::Retryable => Outcome::RetryableFailure(error),
                Disposition::Fatal => Outcome::FatalFailure(error),
            },
        }
    }
}

/// Rejected retry policy parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("max attempts must be at least 1")]
    ZeroAttempts,
    #[error("max delay {max:?} is below base delay {base:?}")]
    MaxBelowBase { base: Duration, max: Duration },
    #[error("jitter fraction {0} is outside 0.0..=1.0")]
    JitterOutOfRange(f64),
}

/// Immutable retry configuration.
///
/// Invariants (checked by [`RetryPolicy::new`]): `max_attempts >= 1`,
/// `max_delay >= base_delay`, `0.0 <= jitter_fraction <= 1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_fraction: f64,
}

impl Default for RetryPolicy {
    /// One initial attempt plus five retries, starting at one minute and
    /// capped at one fifteen-minute rate-limit window.
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(15 * 60),
            jitter_fraction: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        jitter_fraction: f64,
    ) -> Result<Self, PolicyError> {
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if max_delay < base_delay {
            return Err(PolicyError::MaxBelowBase {
                base: base_delay,
                max: max_delay,
            });
        }
        if !(0.0..=1.0).contains(&jitter_fraction) {
            return Err(PolicyError::JitterOutOfRange(jitter_fraction));
        }

        Ok(Self {
            max_attempts,
            base_delay,
            max_delay,
            jitter_fraction,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn jitter_fraction(&self) -> f64 {
        self.jitter_fraction
    }

    /// Delay after failed attempt `attempt` (1-indexed), before jitter:
    /// `min(base_delay * 2^(attempt-1), max_delay)`. Saturates instead of
    /// overflowing.
    pub fn capped_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Scale `delay` by a uniform factor in `[1 - jitter, 1 + jitter]`.
    pub fn apply_jitter<R: Rng + ?Sized>(&self, delay: Duration, rng: &mut R) -> Duration {
        if self.jitter_fraction == 0.0 || delay.is_zero() {
            return delay;
        }

        let factor = rng.random_range((1.0 - self.jitter_fraction)..=(1.0 + self.jitter_fraction));
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }

    /// Full delay before the attempt following failed attempt `attempt`.
    ///
    /// The cap applies before jitter. A server-specified `retry_after` wins
    /// when it is longer than the computed delay.
    pub fn backoff_delay<R: Rng + ?Sized>(
        &self,
        attempt: u32,
        retry_after: Option<Duration>,
        rng: &mut R,
    ) -> Duration {
        let computed = self.apply_jitter(self.capped_delay(attempt), rng);
        match retry_after {
            Some(server) => computed.max(server),
            None => computed,
        }
    }
}

/// Record handed to the action for each attempt. Lives only for that call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-indexed attempt number.
    pub number: u32,
    /// Backoff slept right before this attempt (zero for the first).
    pub delay: Duration,
    /// Time since the first attempt started.
    pub elapsed: Duration,
}

impl Attempt {
    pub fn is_retry(&self) -> bool {
        self.number > 1
    }
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The action failed in a way retrying cannot fix.
    #[error("fatal failure on attempt {attempt}: {source}")]
    Fatal {
        attempt: u32,
        #[source]
        source: E,
    },

    /// Every allowed attempt failed with a retryable error.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },

    /// Shutdown was signalled before `attempt` could run.
    #[error("cancelled before attempt {attempt}")]
    Cancelled { attempt: u32 },
}

impl<E> RetryError<E> {
    /// Number of times the action actually ran.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Fatal { attempt, .. } => *attempt,
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::Cancelled { attempt } => attempt - 1,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// The underlying failure, if the action produced one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Fatal { source, .. } => Some(source),
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Cancelled { .. } => None,
        }
    }
}

/// Runs actions under a [`RetryPolicy`], honouring a shutdown signal.
///
/// Holds no per-call state, so concurrent invocations are independent.
#[derive(Debug, Clone)]
pub struct Invoker {
    policy: RetryPolicy,
    shutdown: Shutdown,
}

impl Invoker {
    pub fn new(policy: RetryPolicy, shutdown: Shutdown) -> Self {
        Self { policy, shutdown }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `action` until it succeeds, fails fatally, runs out of attempts or
    /// shutdown is signalled.
    ///
    /// Shutdown is checked before every attempt and raced against every
    /// backoff sleep.
    pub async fn invoke<T, E, F, Fut>(&self, mut action: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let started = Instant::now();
        let mut attempt = 1;
        let mut delay = Duration::ZERO;

        loop {
            if self.shutdown.is_triggered() {
                return Err(RetryError::Cancelled { attempt });
            }

            let record = Attempt {
                number: attempt,
                delay,
                elapsed: started.elapsed(),
            };

            let error = match Outcome::classify(action(record).await) {
                Outcome::Success(value) => return Ok(value),
                Outcome::FatalFailure(source) => {
                    return Err(RetryError::Fatal { attempt, source })
                }
                Outcome::RetryableFailure(error) => error,
            };

            if attempt >= self.policy.max_attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let retry_after = error.retry_after();
            drop(error);
            delay = self
                .policy
                .backoff_delay(attempt, retry_after, &mut rand::rng());
            log::debug!(
                "Attempt {}/{} failed, backing off for {:?}",
                attempt,
                self.policy.max_attempts,
                delay
            );

            tokio::select! {
                _ = sleep(delay) => {}
                _ = self.shutdown.triggered() => {
                    return Err(RetryError::Cancelled { attempt: attempt + 1 });
                }
            }

            attempt += 1;
        }
    }
}
