//! Bounded retry with fixed or linear-plus-jitter backoff.
//!
//! Every loop in the crate that retries a backend goes through
//! [`RetryPolicy::run`], so each has an explicit attempt ceiling.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

/// Delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay after every failed attempt.
    Fixed {
        #[serde(with = "millis")]
        delay: Duration,
    },
    /// `attempt * step + uniform(0, jitter)`, where the first retry has
    /// `attempt == 0`.
    Linear {
        #[serde(with = "millis")]
        step: Duration,
        #[serde(with = "millis")]
        jitter: Duration,
    },
}

impl Backoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay } => delay,
            Backoff::Linear { step, jitter } => {
                let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
                let extra = if jitter_ms == 0 {
                    0
                } else {
                    rand::rng().random_range(0..=jitter_ms)
                };
                step.saturating_mul(attempt)
                    .saturating_add(Duration::from_millis(extra))
            }
        }
    }
}

/// How many times to try, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

/// Why [`RetryPolicy::run`] gave up.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error; `last` is the final one.
    Exhausted { attempts: u32, last: E },
    /// An attempt failed with an error the predicate did not accept.
    Aborted(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Aborted(err) => err,
        }
    }
}

impl RetryPolicy {
    /// Transient connectivity failures: ten tries, half a second apart.
    pub const CONNECTIVITY: RetryPolicy = RetryPolicy {
        max_attempts: 10,
        backoff: Backoff::Fixed {
            delay: Duration::from_millis(500),
        },
    };

    /// Id collisions between concurrent publishers.
    pub const ID_CONTENTION: RetryPolicy = RetryPolicy {
        max_attempts: 100,
        backoff: Backoff::Linear {
            step: Duration::from_millis(20),
            jitter: Duration::from_millis(100),
        },
    };

    /// Run `op` until it succeeds, fails with an error `is_retryable`
    /// rejects, or `max_attempts` attempts have been made.
    ///
    /// `op` receives the zero-based attempt number.
    pub async fn run<T, E, F, Fut, P>(&self, is_retryable: P, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if !is_retryable(&err) => return Err(RetryError::Aborted(err)),
                Err(err) => {
                    if attempt + 1 >= max_attempts {
                        return Err(RetryError::Exhausted {
                            attempts: max_attempts,
                            last: err,
                        });
                    }
                    let delay = self.backoff.delay(attempt);
                    tracing::debug!(attempt, ?delay, "retrying after transient failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const FAST: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        backoff: Backoff::Fixed {
            delay: Duration::from_millis(1),
        },
    };

    #[test]
    fn extreme_backoff_saturates() {
        let backoff = Backoff::Linear {
            step: Duration::MAX,
            jitter: Duration::from_millis(100),
        };
        assert_eq!(backoff.delay(3), Duration::MAX);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, RetryError<&str>> = FAST
            .run(
                |_| true,
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move { if attempt < 2 { Err("down") } else { Ok(attempt) } }
                },
            )
            .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_at_the_ceiling() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<&str>> = FAST
            .run(
                |_| true,
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("down") }
                },
            )
            .await;
        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 3,
                last: "down"
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_abort_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<&str>> = FAST
            .run(
                |err| *err != "fatal",
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("fatal") }
                },
            )
            .await;
        assert_eq!(result, Err(RetryError::Aborted("fatal")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn linear_backoff_stays_within_bounds() {
        let backoff = Backoff::Linear {
            step: Duration::from_millis(20),
            jitter: Duration::from_millis(100),
        };
        for attempt in [0, 1, 5, 99] {
            let delay = backoff.delay(attempt);
            let floor = Duration::from_millis(20 * u64::from(attempt));
            assert!(delay >= floor);
            assert!(delay <= floor + Duration::from_millis(100));
        }
    }

    #[test]
    fn policies_deserialize_from_millis() {
        let policy: RetryPolicy = from_json(
            r#"{"max_attempts": 5, "backoff": {"kind": "linear", "step": 10, "jitter": 0}}"#,
        );
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff.delay(3), Duration::from_millis(30));
    }

    fn from_json(json: &str) -> RetryPolicy {
        serde_json::from_str(json).unwrap()
    }
}
