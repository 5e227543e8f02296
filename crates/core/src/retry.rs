//! Bounded retry with exponential backoff.
//!
//! Contention on hot rows (credit accounts, mostly) is handled by retrying
//! the whole operation a bounded number of times, then surfacing a
//! retries-exhausted error to the caller. The policy is independent of any
//! particular lock primitive.

use std::time::Duration;

/// Bounded exponential backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Sleep before the second attempt.
    pub initial_backoff: Duration,
    /// Backoff is doubled per attempt, capped here.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(2),
            max_backoff: Duration::from_millis(64),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Backoff to sleep after the given zero-based failed attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is exhausted. `is_retryable` classifies errors.
    pub fn run<T, E>(
        &self,
        mut op: impl FnMut() -> Result<T, E>,
        is_retryable: impl Fn(&E) -> bool,
    ) -> Result<T, RetryOutcome<E>> {
        let mut attempt = 0u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable(&e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(RetryOutcome::Exhausted {
                            attempts: attempt,
                            last: e,
                        });
                    }
                    std::thread::sleep(self.backoff_for(attempt - 1));
                }
                Err(e) => return Err(RetryOutcome::Fatal(e)),
            }
        }
    }
}

/// Terminal result of a retried operation that never succeeded.
#[derive(Debug)]
pub enum RetryOutcome<E> {
    /// The error was not retryable; surfaced as-is.
    Fatal(E),
    /// The attempt budget ran out on a retryable error.
    Exhausted { attempts: u32, last: E },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default().with_max_attempts(4);
        let result: Result<u32, RetryOutcome<&str>> = policy.run(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 { Err("busy") } else { Ok(n) }
            },
            |_| true,
        );
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(0),
            max_backoff: Duration::from_millis(0),
        };
        let result: Result<(), RetryOutcome<&str>> = policy.run(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("busy")
            },
            |_| true,
        );
        match result {
            Err(RetryOutcome::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "busy");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let result: Result<(), RetryOutcome<&str>> = policy.run(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("insufficient")
            },
            |_| false,
        );
        assert!(matches!(result, Err(RetryOutcome::Fatal("insufficient"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
        };
        assert_eq!(policy.backoff_for(0), Duration::from_millis(10));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(20));
        assert_eq!(policy.backoff_for(6), Duration::from_millis(50));
    }
}
