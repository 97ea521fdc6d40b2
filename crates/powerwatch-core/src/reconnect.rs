//! Reconnect backoff policy for the stream client.
//!
//! The default policy is a fixed 5 second delay with unlimited attempts:
//! the telemetry link is expected to come and go (the controller reboots,
//! the access point drops), and the client simply keeps trying until its
//! owner cancels it. Exponential backoff with a cap is available for
//! deployments where hammering a dead endpoint matters more than fast
//! recovery.

use std::time::Duration;

use rand::Rng;

use crate::error::{Error, Result};

/// Options controlling the reconnect loop.
#[derive(Debug, Clone)]
pub struct ReconnectOptions {
    /// Maximum number of consecutive failed attempts before giving up
    /// (None = unlimited).
    pub max_attempts: Option<u32>,
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (for exponential backoff).
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to use exponential backoff.
    pub use_exponential_backoff: bool,
    /// Whether to add up to 10% random jitter to each delay.
    pub jitter: bool,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            use_exponential_backoff: false,
            jitter: false,
        }
    }
}

impl ReconnectOptions {
    /// Create new reconnect options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create options with a fixed delay between attempts.
    pub fn fixed_delay(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            use_exponential_backoff: false,
            ..Default::default()
        }
    }

    /// Create options with exponential backoff capped at `max_delay`.
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            use_exponential_backoff: true,
            jitter: true,
            ..Default::default()
        }
    }

    /// Set the maximum number of attempts.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set the initial delay.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Calculate the delay for a given attempt number (0-based).
    ///
    /// Jitter, when enabled, adds up to 10% on top of the computed delay so
    /// that a fleet of dashboards does not reconnect in lockstep.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = if self.use_exponential_backoff {
            let delay_ms = self.initial_delay.as_millis() as f64
                * self.backoff_multiplier.powi(attempt as i32);
            Duration::from_millis(delay_ms as u64).min(self.max_delay)
        } else {
            self.initial_delay
        };

        if self.jitter {
            let extra = rand::rng().random_range(0.0..0.1);
            base + base.mul_f64(extra)
        } else {
            base
        }
    }

    /// Validate the options and return an error if invalid.
    ///
    /// Checks that:
    /// - `backoff_multiplier` is >= 1.0
    /// - `initial_delay` is > 0
    /// - `max_delay` >= `initial_delay`
    pub fn validate(&self) -> Result<()> {
        if self.backoff_multiplier < 1.0 {
            return Err(Error::invalid_config("backoff_multiplier must be >= 1.0"));
        }
        if self.initial_delay.is_zero() {
            return Err(Error::invalid_config("initial_delay must be > 0"));
        }
        if self.max_delay < self.initial_delay {
            return Err(Error::invalid_config("max_delay must be >= initial_delay"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_fixed_five_seconds_unlimited() {
        let opts = ReconnectOptions::default();
        assert_eq!(opts.max_attempts, None);
        assert_eq!(opts.initial_delay, Duration::from_secs(5));
        assert!(!opts.use_exponential_backoff);
        assert_eq!(opts.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(opts.delay_for_attempt(12), Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_delay_calculation() {
        let opts = ReconnectOptions {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            use_exponential_backoff: true,
            jitter: false,
            ..Default::default()
        };

        assert_eq!(opts.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(opts.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(opts.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(opts.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let opts = ReconnectOptions {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            use_exponential_backoff: true,
            jitter: false,
            ..Default::default()
        };

        // 2^10 = 1024 seconds, but capped at 10
        assert_eq!(opts.delay_for_attempt(10), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let opts = ReconnectOptions {
            jitter: true,
            ..Default::default()
        };
        for attempt in 0..20 {
            let delay = opts.delay_for_attempt(attempt);
            assert!(delay >= Duration::from_secs(5));
            assert!(delay <= Duration::from_millis(5500));
        }
    }

    #[test]
    fn test_validate_rejects_bad_options() {
        let opts = ReconnectOptions {
            backoff_multiplier: 0.5,
            ..Default::default()
        };
        assert!(opts.validate().is_err());

        let opts = ReconnectOptions {
            initial_delay: Duration::ZERO,
            ..Default::default()
        };
        assert!(opts.validate().is_err());

        let opts = ReconnectOptions {
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(5),
            ..Default::default()
        };
        assert!(opts.validate().is_err());

        assert!(ReconnectOptions::default().validate().is_ok());
    }
}
