//! Time utilities for gatecheck
//!
//! Provides common time-related operations used across crates.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is set before the Unix epoch.
///
/// # Examples
/// ```
/// use gc_core::time::current_time_millis;
///
/// let now = current_time_millis();
/// assert!(now > 0);
/// ```
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Duration in milliseconds rounded to two decimal places, for reports
pub fn duration_ms(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_time_millis_is_positive() {
        let now = current_time_millis();
        assert!(now > 0);
    }

    #[test]
    fn test_duration_ms_rounding() {
        assert_eq!(duration_ms(Duration::from_micros(1234)), 1.23);
        assert_eq!(duration_ms(Duration::from_millis(15_000)), 15_000.0);
        assert_eq!(duration_ms(Duration::ZERO), 0.0);
    }
}
