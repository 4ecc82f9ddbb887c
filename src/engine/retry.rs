//! engine::retry
//!
//! Caller-side retry for transient failures.
//!
//! Only `Transient` failures are retried. Validation, authorization and
//! not-found outcomes are returned on the first attempt: retrying them
//! cannot change the answer.
//!
//! Delays grow exponentially from `base_delay`, capped at `max_delay`.

use std::time::Duration;

use super::error::RegistrationError;
use crate::core::config::Config;

/// Retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Config::DEFAULT_RETRY_ATTEMPTS,
            base_delay: Duration::from_millis(Config::DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(Config::DEFAULT_RETRY_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.retry_max_attempts(),
            base_delay: config.retry_base_delay(),
            max_delay: config.retry_max_delay(),
        }
    }

    /// Single attempt, no retry.
    pub fn never() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Run `op`, retrying transient failures.
    pub fn run<T, F>(&self, op: F) -> Result<T, RegistrationError>
    where
        F: FnMut() -> Result<T, RegistrationError>,
    {
        self.run_with_sleep(op, std::thread::sleep)
    }

    /// [`run`](Self::run) with an injectable sleep.
    pub fn run_with_sleep<T, F, S>(&self, mut op: F, mut sleep: S) -> Result<T, RegistrationError>
    where
        F: FnMut() -> Result<T, RegistrationError>,
        S: FnMut(Duration),
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(attempt, ?delay, error = %e, "transient failure, retrying");
                    sleep(delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(35),
        }
    }

    #[test]
    fn delays_grow_and_cap() {
        let p = policy(5);
        assert_eq!(p.delay_for(1), Duration::from_millis(10));
        assert_eq!(p.delay_for(2), Duration::from_millis(20));
        assert_eq!(p.delay_for(3), Duration::from_millis(35));
        assert_eq!(p.delay_for(40), Duration::from_millis(35));
    }

    #[test]
    fn transient_failures_are_retried_until_success() {
        let mut calls = 0;
        let mut slept = Vec::new();
        let result = policy(3).run_with_sleep(
            || {
                calls += 1;
                if calls < 3 {
                    Err(RegistrationError::Unavailable("busy".into()))
                } else {
                    Ok(calls)
                }
            },
            |d| slept.push(d),
        );
        assert_eq!(result, Ok(3));
        assert_eq!(
            slept,
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), _> = policy(2).run_with_sleep(
            || {
                calls += 1;
                Err(RegistrationError::Unavailable("busy".into()))
            },
            |_| {},
        );
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls, 2);
    }

    #[test]
    fn non_transient_failures_return_immediately() {
        let mut calls = 0;
        let result: Result<(), _> = policy(5).run_with_sleep(
            || {
                calls += 1;
                Err(RegistrationError::NotAuthorized)
            },
            |_| panic!("must not sleep"),
        );
        assert_eq!(result, Err(RegistrationError::NotAuthorized));
        assert_eq!(calls, 1);
    }

    #[test]
    fn corrupt_state_is_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = policy(5).run_with_sleep(
            || {
                calls += 1;
                Err(crate::store::StoreError::Corrupt("dangling offering".into()).into())
            },
            |_| panic!("must not sleep"),
        );
        assert_eq!(result.unwrap_err().kind(), crate::engine::FailureKind::Internal);
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let mut calls = 0;
        let _ = policy(0).run_with_sleep(
            || {
                calls += 1;
                Err::<(), _>(RegistrationError::Unavailable("busy".into()))
            },
            |_| {},
        );
        assert_eq!(calls, 1);
    }

    #[test]
    fn from_config_uses_defaults() {
        assert_eq!(RetryPolicy::from_config(&Config::default()), RetryPolicy::default());
        assert_eq!(RetryPolicy::never().max_attempts, 1);
    }
}
