//! Reconnect backoff and connection state

use std::time::Duration;

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

/// Lifecycle of the websocket connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

// ----------------------------------------------------------------------------
// Backoff
// ----------------------------------------------------------------------------

/// Reconnect delay configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay before the first reconnect attempt
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Factor applied to the delay after each failure
    pub multiplier: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2,
        }
    }
}

/// Exponential reconnect delay that never gives up
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    current_delay: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        let current_delay = config.initial_delay.min(config.max_delay);
        Self {
            config,
            current_delay,
            failures: 0,
        }
    }

    /// Delay to wait after a failure, then grow the next one
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_delay;

        self.failures = self.failures.saturating_add(1);
        self.current_delay = self
            .current_delay
            .checked_mul(self.config.multiplier)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay);

        delay
    }

    /// Delay the next failure would wait, without consuming it
    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    /// Back to the initial delay (call on successful connection)
    pub fn reset(&mut self) {
        self.current_delay = self.config.initial_delay.min(self.config.max_delay);
        self.failures = 0;
    }

    /// Consecutive failures since the last reset
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_sequence_caps_at_sixty_seconds() {
        let mut backoff = Backoff::default();
        let delays: Vec<u64> = (0..9).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60, 60]);
        assert_eq!(backoff.failures(), 9);
    }

    #[test]
    fn test_reset_restores_initial_delay() {
        let mut backoff = Backoff::default();
        for _ in 0..4 {
            backoff.next_delay();
        }
        assert_eq!(backoff.current_delay(), Duration::from_secs(16));

        backoff.reset();
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_initial_delay_above_cap_is_clamped() {
        let mut backoff = Backoff::new(BackoffConfig {
            initial_delay: Duration::from_secs(90),
            max_delay: Duration::from_secs(60),
            multiplier: 2,
        });
        assert_eq!(backoff.next_delay(), Duration::from_secs(60));
    }

    proptest! {
        #[test]
        fn delays_never_shrink_and_never_exceed_cap(
            initial_ms in 1u64..5_000,
            max_ms in 1u64..120_000,
            steps in 1usize..40,
        ) {
            let config = BackoffConfig {
                initial_delay: Duration::from_millis(initial_ms),
                max_delay: Duration::from_millis(max_ms),
                multiplier: 2,
            };
            let mut backoff = Backoff::new(config.clone());
            let mut previous = Duration::ZERO;
            for _ in 0..steps {
                let delay = backoff.next_delay();
                prop_assert!(delay <= config.max_delay);
                prop_assert!(delay >= previous);
                previous = delay;
            }
        }
    }
}
