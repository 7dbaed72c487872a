// Retry helpers: a bounded retry loop with multiplicative backoff and the
// error type used at the HTTP seam. Sleeping goes through `Sleeper` so the
// loop can be driven without real delays in tests.

use std::str::FromStr;
use std::thread;
use std::time::Duration;

use thiserror::Error;

/// Errors produced by outbound requests.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Method {0} not supported.")]
    UnsupportedMethod(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// The two HTTP verbs the client is willing to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl FromStr for Method {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            _ => Err(RequestError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// Something that can block the current thread for a while.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Real sleeper backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(2000),
            multiplier: 1.5,
        }
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` is used up.
///
/// Between attempts the current backoff is slept and then grown by
/// `policy.multiplier`. The error from the final attempt is returned as-is.
/// A policy with `max_attempts == 0` still makes one attempt.
pub fn retry_with_backoff<T, E, F>(policy: &RetryPolicy, sleeper: &dyn Sleeper, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
{
    let attempts = policy.max_attempts.max(1);
    let mut backoff = policy.initial_backoff;
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => return Err(err),
            Err(_) => {
                log::debug!("attempt {}/{} failed, retrying in {:?}", attempt, attempts, backoff);
                sleeper.sleep(backoff);
                backoff = backoff.mul_f64(policy.multiplier);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records requested sleeps instead of blocking.
    #[derive(Default)]
    pub(crate) struct RecordingSleeper {
        pub(crate) slept: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.borrow_mut().push(duration);
        }
    }

    #[test]
    fn succeeds_after_k_failures_with_growing_backoff() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::default();
        let result: Result<&str, String> = retry_with_backoff(&policy, &sleeper, |attempt| {
            if attempt < 3 {
                Err(format!("boom {}", attempt))
            } else {
                Ok("done")
            }
        });
        assert_eq!(result.unwrap(), "done");
        let slept = sleeper.slept.borrow();
        assert_eq!(*slept, vec![Duration::from_millis(2000), Duration::from_millis(3000)]);
    }

    #[test]
    fn first_attempt_success_does_not_sleep() {
        let sleeper = RecordingSleeper::default();
        let result: Result<u8, String> = retry_with_backoff(&RetryPolicy::default(), &sleeper, |_| Ok(7));
        assert_eq!(result.unwrap(), 7);
        assert!(sleeper.slept.borrow().is_empty());
    }

    #[test]
    fn returns_last_error_unchanged() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let result: Result<(), String> = retry_with_backoff(&RetryPolicy::default(), &sleeper, |attempt| {
            calls += 1;
            Err(format!("failure on attempt {}", attempt))
        });
        assert_eq!(result.unwrap_err(), "failure on attempt 3");
        assert_eq!(calls, 3);
        assert_eq!(sleeper.slept.borrow().len(), 2);
    }

    #[test]
    fn method_parsing_accepts_get_and_post_only() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("post".parse::<Method>().unwrap(), Method::Post);
        match "PUT".parse::<Method>() {
            Err(RequestError::UnsupportedMethod(m)) => assert_eq!(m, "PUT"),
            other => panic!("expected unsupported method, got {:?}", other),
        }
    }
}
