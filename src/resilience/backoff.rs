//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Calculate the exponential backoff delay that follows `attempt`.
///
/// `delay = min(max, base × multiplier^(attempt − 1))`; attempt 0 yields no delay.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration, multiplier: f64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = (attempt - 1).min(i32::MAX as u32) as i32;
    let delay_nanos = base.as_nanos() as f64 * multiplier.powi(exponent);
    let max_nanos = max.as_nanos() as f64;

    if !delay_nanos.is_finite() || delay_nanos >= max_nanos {
        return max;
    }
    if delay_nanos <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(delay_nanos.round() as u64)
}

/// Full jitter: a uniform draw from `[0, delay]`.
pub fn full_jitter(delay: Duration) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    rand::thread_rng().gen_range(Duration::ZERO..=delay)
}
