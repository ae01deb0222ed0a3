//! Fixed-delay retry policy for start-up races against a launching server.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MatrixError, MatrixResult};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Up to `max_attempts` tries with a constant `delay` in between.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Why [`RetryPolicy::run`] stopped without a result.
#[derive(Debug)]
pub enum RetryOutcome<E> {
    /// A non-transient error; returned on the attempt it happened.
    Fatal(E),
    Exhausted { attempts: u32, last: E },
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub fn validate(&self) -> MatrixResult<()> {
        if self.max_attempts == 0 {
            return Err(MatrixError::InvalidConfig {
                field: "retry.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Upper bound on time spent sleeping between attempts.
    pub fn budget(&self) -> Duration {
        self.delay * self.max_attempts.saturating_sub(1)
    }

    /// Call `op` with the 1-based attempt number until it succeeds, fails with
    /// an error `transient` rejects, or the attempts run out.
    pub fn run<T, E>(
        &self,
        mut op: impl FnMut(u32) -> Result<T, E>,
        transient: impl Fn(&E) -> bool,
    ) -> Result<T, RetryOutcome<E>> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if !transient(&e) => return Err(RetryOutcome::Fatal(e)),
                Err(e) if attempt >= max_attempts => {
                    return Err(RetryOutcome::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(_) => {
                    crate::trace!("attempt {attempt}/{max_attempts} failed; retrying in {:?}", self.delay);
                    std::thread::sleep(self.delay);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.delay, Duration::from_secs(1));
        assert_eq!(policy.budget(), Duration::from_secs(9));
        assert!(RetryPolicy::new(0, Duration::ZERO).validate().is_err());
    }

    #[test]
    fn retries_transient_until_success() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let mut calls = 0;
        let out: Result<u32, RetryOutcome<&str>> = policy.run(
            |attempt| {
                calls += 1;
                if attempt < 3 { Err("refused") } else { Ok(attempt) }
            },
            |_| true,
        );
        assert_eq!(out.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn stops_on_fatal_and_on_budget() {
        let policy = RetryPolicy::new(4, Duration::from_millis(1));

        let fatal: Result<(), _> = policy.run(|_| Err("fatal"), |e| *e != "fatal");
        assert!(matches!(fatal, Err(RetryOutcome::Fatal("fatal"))));

        let mut calls = 0;
        let exhausted: Result<(), _> = policy.run(
            |_| {
                calls += 1;
                Err("refused")
            },
            |_| true,
        );
        assert!(matches!(
            exhausted,
            Err(RetryOutcome::Exhausted { attempts: 4, last: "refused" })
        ));
        assert_eq!(calls, 4);
    }
}
