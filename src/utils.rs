//! Small shared helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time in milliseconds since the Unix epoch.
///
/// Falls back to 0 if the system clock is before the epoch, so callers never
/// have to deal with an error on a timestamping path.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_time_millis_is_monotonic_enough() {
        let a = current_time_millis();
        let b = current_time_millis();
        assert!(b >= a);
        // Sanity: we are well past 2020-01-01 in milliseconds.
        assert!(a > 1_577_836_800_000);
    }
}
