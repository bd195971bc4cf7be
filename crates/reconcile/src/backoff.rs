//! Backoff policies and retry with notification.
//!
//! A [`Backoff`] is a stateful schedule owned by exactly one retrying call
//! site. [`retry_notify`] resets it, runs the operation, and sleeps for the
//! delay the policy hands out after every failure until the operation
//! succeeds or the policy gives up.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A retry schedule
pub trait Backoff: Send {
    /// Delay before the next attempt, or `None` to stop retrying.
    ///
    /// Called once after every failed attempt.
    fn next_backoff(&mut self) -> Option<Duration>;

    /// Restart the schedule from its first delay
    fn reset(&mut self);
}

impl<B: Backoff + ?Sized> Backoff for Box<B> {
    fn next_backoff(&mut self) -> Option<Duration> {
        (**self).next_backoff()
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

/// Produces a fresh policy for every retrying call site
pub type BackoffFactory = Arc<dyn Fn() -> Box<dyn Backoff> + Send + Sync>;

/// Factory for the standard exponential schedule
pub fn default_backoff_factory() -> BackoffFactory {
    Arc::new(|| -> Box<dyn Backoff> { Box::new(ExponentialBackoff::default()) })
}

// ============================================================================
// Exponential
// ============================================================================

/// Exponentially growing delays with optional attempt and elapsed-time caps
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay after the first failure
    pub initial_interval: Duration,
    /// Multiplier applied to the delay after every failure
    pub multiplier: f64,
    /// Upper bound for a single delay
    pub max_interval: Duration,
    /// Give up once this much time has passed since the last reset
    pub max_elapsed_time: Option<Duration>,
    /// Give up after this many attempts in total
    pub max_attempts: Option<u32>,

    attempt: u32,
    started: Instant,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
            max_elapsed_time: Some(Duration::from_secs(15 * 60)),
            max_attempts: None,
            attempt: 0,
            started: Instant::now(),
        }
    }
}

impl ExponentialBackoff {
    /// Create a policy with custom growth and no elapsed-time cap.
    pub fn new(initial_interval: Duration, multiplier: f64, max_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier,
            max_interval,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_max_elapsed_time(mut self, max_elapsed_time: Option<Duration>) -> Self {
        self.max_elapsed_time = max_elapsed_time;
        self
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.initial_interval.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = delay.min(self.max_interval.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}

impl Backoff for ExponentialBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;

        if let Some(max) = self.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }

        let delay = self.delay_for_attempt(self.attempt - 1);

        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.started.elapsed() + delay > max_elapsed {
                return None;
            }
        }

        Some(delay)
    }

    fn reset(&mut self) {
        self.attempt = 0;
        self.started = Instant::now();
    }
}

// ============================================================================
// Constant / Stop
// ============================================================================

/// The same delay between every attempt
#[derive(Debug, Clone)]
pub struct ConstantBackoff {
    pub interval: Duration,
    /// Give up after this many attempts in total
    pub max_attempts: Option<u32>,
    attempt: u32,
}

impl ConstantBackoff {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            attempt: 0,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl Backoff for ConstantBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        match self.max_attempts {
            Some(max) if self.attempt >= max => None,
            _ => Some(self.interval),
        }
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Never retries
#[derive(Debug, Clone, Copy, Default)]
pub struct StopBackoff;

impl Backoff for StopBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}
}

// ============================================================================
// Config
// ============================================================================

/// Serializable description of an exponential schedule
///
/// Durations are given in milliseconds. `max_elapsed_ms = 0` disables the
/// elapsed-time cap; `max_attempts = 0` disables the attempt cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_interval_ms: u64,
    pub multiplier: f64,
    pub max_interval_ms: u64,
    pub max_elapsed_ms: u64,
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 500,
            multiplier: 1.5,
            max_interval_ms: 60_000,
            max_elapsed_ms: 15 * 60 * 1000,
            max_attempts: 0,
        }
    }
}

impl BackoffConfig {
    /// Build a fresh policy from this config
    pub fn build(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(self.initial_interval_ms),
            self.multiplier,
            Duration::from_millis(self.max_interval_ms),
        );
        if self.max_elapsed_ms > 0 {
            backoff.max_elapsed_time = Some(Duration::from_millis(self.max_elapsed_ms));
        }
        if self.max_attempts > 0 {
            backoff.max_attempts = Some(self.max_attempts);
        }
        backoff
    }

    /// A factory handing out policies built from this config
    pub fn factory(&self) -> BackoffFactory {
        let config = self.clone();
        Arc::new(move || -> Box<dyn Backoff> { Box::new(config.build()) })
    }
}

// ============================================================================
// Retry
// ============================================================================

/// Retry `operation` under `backoff`, calling `notify` before each wait.
///
/// Returns the first success, or the last error once the policy is
/// exhausted. The calling thread sleeps between attempts.
pub fn retry_notify<T, E, F, N>(backoff: &mut dyn Backoff, operation: F, notify: N) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    N: FnMut(&E, Duration),
{
    retry_notify_when(backoff, operation, |_| true, notify)
}

/// Like [`retry_notify`], but errors for which `is_retryable` returns false
/// are returned immediately.
pub fn retry_notify_when<T, E, F, P, N>(
    backoff: &mut dyn Backoff,
    mut operation: F,
    mut is_retryable: P,
    mut notify: N,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    P: FnMut(&E) -> bool,
    N: FnMut(&E, Duration),
{
    backoff.reset();

    loop {
        let err = match operation() {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_retryable(&err) {
            return Err(err);
        }

        let Some(delay) = backoff.next_backoff() else {
            return Err(err);
        };

        notify(&err, delay);
        thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast(max_attempts: u32) -> ConstantBackoff {
        ConstantBackoff::new(Duration::from_millis(1)).with_max_attempts(max_attempts)
    }

    #[test]
    fn test_delay_for_attempt() {
        let backoff = ExponentialBackoff::new(
            Duration::from_secs(10),
            2.0,
            Duration::from_secs(300),
        );

        assert_eq!(backoff.delay_for_attempt(0), Duration::from_secs(10));
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(20));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_secs(40));
    }

    #[test]
    fn test_max_interval_caps_delay() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(10), 2.0, Duration::from_secs(30));

        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(10)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(20)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(30)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_max_attempts_and_reset() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_millis(1), 2.0, Duration::from_millis(10))
                .with_max_attempts(3);

        assert!(backoff.next_backoff().is_some());
        assert!(backoff.next_backoff().is_some());
        assert_eq!(backoff.next_backoff(), None);

        backoff.reset();
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(1)));
    }

    #[test]
    fn test_max_elapsed_time() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(10), 2.0, Duration::from_secs(60))
                .with_max_elapsed_time(Some(Duration::from_secs(5)));

        assert_eq!(backoff.next_backoff(), None);
    }

    #[test]
    fn test_stop_backoff() {
        assert_eq!(StopBackoff.next_backoff(), None);
    }

    #[test]
    fn test_retry_success_first_try() {
        let notified = Cell::new(0);
        let result: Result<u32, String> =
            retry_notify(&mut fast(3), || Ok(42), |_, _| notified.set(notified.get() + 1));

        assert_eq!(result.unwrap(), 42);
        assert_eq!(notified.get(), 0);
    }

    #[test]
    fn test_retry_eventual_success() {
        let attempts = Cell::new(0);
        let notified = Cell::new(0);

        let result = retry_notify(
            &mut fast(3),
            || {
                attempts.set(attempts.get() + 1);
                if attempts.get() < 3 {
                    Err("timeout")
                } else {
                    Ok(42)
                }
            },
            |_, _| notified.set(notified.get() + 1),
        );

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.get(), 3);
        assert_eq!(notified.get(), 2);
    }

    #[test]
    fn test_retry_exhausted_returns_last_error() {
        let attempts = Cell::new(0);

        let result: Result<(), String> = retry_notify(
            &mut fast(3),
            || {
                attempts.set(attempts.get() + 1);
                Err(format!("attempt {}", attempts.get()))
            },
            |_, _| {},
        );

        assert_eq!(result.unwrap_err(), "attempt 3");
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_retry_resets_policy() {
        let mut backoff = fast(2);

        let first: Result<(), &str> = retry_notify(&mut backoff, || Err("x"), |_, _| {});
        assert!(first.is_err());

        let attempts = Cell::new(0);
        let second: Result<(), &str> = retry_notify(
            &mut backoff,
            || {
                attempts.set(attempts.get() + 1);
                Err("x")
            },
            |_, _| {},
        );
        assert!(second.is_err());
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn test_non_retryable_error_returns_immediately() {
        let attempts = Cell::new(0);

        let result: Result<(), &str> = retry_notify_when(
            &mut fast(5),
            || {
                attempts.set(attempts.get() + 1);
                Err("fatal")
            },
            |e| *e != "fatal",
            |_, _| {},
        );

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_config_build() {
        let config: BackoffConfig = toml::from_str(
            r#"
            initial_interval_ms = 100
            max_attempts = 4
            max_elapsed_ms = 0
            "#,
        )
        .unwrap();

        let backoff = config.build();
        assert_eq!(backoff.initial_interval, Duration::from_millis(100));
        assert_eq!(backoff.multiplier, 1.5);
        assert_eq!(backoff.max_attempts, Some(4));
        assert_eq!(backoff.max_elapsed_time, None);
    }
}
