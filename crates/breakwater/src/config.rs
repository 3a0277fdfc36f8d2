//! Breaker policy configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Close→open threshold.
///
/// The breaker opens only once `failures` tracked failures all fall inside
/// a trailing `window` of wall-clock time measured from the moment of the
/// check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    /// Number of tracked failures required to open the circuit.
    pub failures: u32,
    /// Trailing wall-clock window the failures must all fall inside.
    #[serde(with = "duration_millis")]
    pub window: Duration,
}

impl Threshold {
    /// Create a new close→open threshold.
    #[must_use]
    pub const fn new(failures: u32, window: Duration) -> Self {
        Self { failures, window }
    }
}

/// Circuit breaker configuration.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use breakwater::{BreakerConfig, Threshold};
///
/// let config = BreakerConfig::new()
///     .with_close_to_open(Threshold::new(3, Duration::from_secs(300)))
///     .with_open_to_half_open(Duration::from_secs(60))
///     .with_half_open_to_close(3);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Time to wait in `Open` before the next admission check or state read
    /// moves the breaker to `HalfOpen`.
    #[serde(with = "duration_millis")]
    pub open_to_half_open: Duration,
    /// Consecutive successes required in `HalfOpen` to close the circuit.
    pub half_open_to_close: u32,
    /// Failure count plus time window required to open from `Closed`.
    pub close_to_open: Threshold,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            open_to_half_open: Duration::from_secs(30),
            half_open_to_close: 2,
            close_to_open: Threshold::new(5, Duration::from_secs(60)),
        }
    }
}

impl BreakerConfig {
    /// Create a new configuration with default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cooldown before an open circuit admits a trial call.
    #[must_use]
    pub const fn with_open_to_half_open(mut self, cooldown: Duration) -> Self {
        self.open_to_half_open = cooldown;
        self
    }

    /// Set the consecutive half-open successes required to close.
    #[must_use]
    pub const fn with_half_open_to_close(mut self, successes: u32) -> Self {
        self.half_open_to_close = successes;
        self
    }

    /// Set the close→open failure threshold.
    #[must_use]
    pub const fn with_close_to_open(mut self, threshold: Threshold) -> Self {
        self.close_to_open = threshold;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.close_to_open.failures == 0 {
            return Err(ConfigError::validation(
                "close_to_open.failures must be positive",
            ));
        }
        if self.close_to_open.window.is_zero() {
            return Err(ConfigError::validation(
                "close_to_open.window must be non-zero",
            ));
        }
        if self.half_open_to_close == 0 {
            return Err(ConfigError::validation(
                "half_open_to_close must be positive",
            ));
        }
        if self.open_to_half_open.is_zero() {
            return Err(ConfigError::validation(
                "open_to_half_open must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Serde support for `Duration` as integer milliseconds.
mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
