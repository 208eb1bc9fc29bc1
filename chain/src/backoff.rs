//! Inter-attempt backoff with exponential growth and down-jitter.
//!
//! # Policy
//!
//! - Initial delay: 500ms
//! - Max delay: 8 seconds
//! - Jitter: down-jitter up to 25% (multiplier in [0.75, 1.0])
//!
//! Only unchanged retries back off. A retry that switches chain targets a
//! different endpoint and starts immediately.

use std::time::Duration;

/// Backoff configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first unchanged retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Jitter factor for down-jitter (0.25 = up to 25% reduction).
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter_factor: 0.25,
        }
    }
}

impl BackoffConfig {
    /// Zero-delay config for tests.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_factor: 0.0,
        }
    }
}

/// Delay before an unchanged retry.
///
/// `step` is 0 before the first retry, 1 before the second, etc.
#[must_use]
pub fn backoff_delay(step: u32, config: &BackoffConfig) -> Duration {
    let exponent = i32::try_from(step).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());
    if !capped.is_finite() || capped <= 0.0 {
        return Duration::ZERO;
    }

    // NaN or infinite factors mean no jitter.
    let jitter_factor = if config.jitter_factor.is_finite() {
        config.jitter_factor.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let jitter = 1.0 - rand::random::<f64>() * jitter_factor;
    Duration::from_secs_f64(capped * jitter)
}
