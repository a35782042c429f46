//! Retry with exponential backoff under a global deadline.
//!
//! The whole retry loop (every attempt and every backoff sleep) runs inside a
//! single `tokio::time::timeout`, so a slow provider cannot stretch a request
//! past `timeout` no matter how many attempts remain.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

/// Errors that know whether another attempt could help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug)]
pub enum RetryError<E> {
    /// The global deadline elapsed; in-flight work was dropped.
    TimedOut(Duration),
    /// Every attempt failed with a retryable error. `last` is the final one.
    Exhausted { attempts: u32, last: E },
    /// A non-retryable error; returned on the attempt that produced it.
    Aborted(E),
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            timeout,
        }
    }

    /// Delay slept after the `attempt`-th failure (1-based): 1x, 2x, 4x, ...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay.saturating_mul(1 << exponent)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, runs out
    /// of attempts, or the deadline passes. `op` receives the 1-based attempt.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);

        let attempts = async {
            let mut attempt = 1;
            loop {
                match op(attempt).await {
                    Ok(value) => return Ok(value),
                    Err(e) if !e.is_retryable() => return Err(RetryError::Aborted(e)),
                    Err(e) if attempt >= max_attempts => {
                        error!("Giving up after {attempt} attempts: {e}");
                        return Err(RetryError::Exhausted { attempts: attempt, last: e });
                    }
                    Err(e) => {
                        let delay = self.delay_after(attempt);
                        warn!(
                            "Attempt {}/{} failed: {}; retrying after {}ms",
                            attempt,
                            max_attempts,
                            e,
                            delay.as_millis()
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        };

        match tokio::time::timeout(self.timeout, attempts).await {
            Ok(result) => result,
            Err(_) => {
                error!("Operation timed out after {:?}", self.timeout);
                Err(RetryError::TimedOut(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::time::Instant;

    use super::*;

    #[derive(Debug)]
    struct Failure {
        retryable: bool,
    }

    impl std::fmt::Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "failure(retryable={})", self.retryable)
        }
    }

    impl Retryable for Failure {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(30))
    }

    #[test]
    fn test_delays_double() {
        let p = policy();
        assert_eq!(p.delay_after(1), Duration::from_secs(1));
        assert_eq!(p.delay_after(2), Duration::from_secs(2));
        assert_eq!(p.delay_after(3), Duration::from_secs(4));
    }

    #[test]
    fn test_zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::from_secs(1)).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures_with_increasing_delays() {
        let started = Instant::now();
        let seen: Arc<Mutex<Vec<Duration>>> = Arc::default();

        let result = policy()
            .run(|attempt| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(started.elapsed());
                    if attempt < 3 {
                        Err(Failure { retryable: true })
                    } else {
                        Ok("answer")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "answer");
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        let first_gap = seen[1] - seen[0];
        let second_gap = seen[2] - seen[1];
        assert!(second_gap > first_gap, "{first_gap:?} then {second_gap:?}");
        assert!(first_gap >= Duration::from_secs(1));
        assert!(second_gap >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_stops_at_max_attempts() {
        let calls = Arc::new(Mutex::new(0u32));
        let started = Instant::now();

        let result: Result<(), _> = policy()
            .run(|_| {
                let calls = calls.clone();
                async move {
                    *calls.lock().unwrap() += 1;
                    Err(Failure { retryable: true })
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 3, .. })));
        assert_eq!(*calls.lock().unwrap(), 3);
        // two sleeps: 1s + 2s, no sleep after the final attempt
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_fails_fast() {
        let calls = Arc::new(Mutex::new(0u32));

        let result: Result<(), _> = policy()
            .run(|_| {
                let calls = calls.clone();
                async move {
                    *calls.lock().unwrap() += 1;
                    Err(Failure { retryable: false })
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Aborted(_))));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_operation_times_out_even_if_it_would_succeed() {
        let p = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(5));

        let result = p
            .run(|_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, Failure>("late answer")
            })
            .await;

        assert!(matches!(result, Err(RetryError::TimedOut(d)) if d == Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_counts_against_the_deadline() {
        let p = RetryPolicy::new(10, Duration::from_secs(4), Duration::from_secs(10));

        let result: Result<(), _> = p
            .run(|_| async { Err(Failure { retryable: true }) })
            .await;

        assert!(matches!(result, Err(RetryError::TimedOut(_))));
    }
}
