use std::time::Duration;

use rand::Rng;
use wb_domain::error::Error;

/// Classify whether an adapter error is worth retrying.
///
/// Timeouts and transport-level HTTP failures are transient; everything
/// else (bad config, JSON decode failure, a provider's hard rejection of
/// the request) will not go away on its own.
pub fn is_retriable(err: &Error) -> bool {
    matches!(err, Error::Timeout(_) | Error::Http(_))
}

/// Exponential backoff with jitter: `initial * 2^(attempt-1) + U(0, jitter)`.
///
/// `attempt` is 1-based (the delay before the *second* try is
/// `delay_for(1, ..)`).
pub fn delay_for(attempt: u32, initial: Duration, jitter: Duration) -> Duration {
    let exp = initial.as_secs_f64() * 2f64.powi(attempt as i32 - 1);
    let jitter_secs = if jitter.is_zero() {
        0.0
    } else {
        rand::thread_rng().gen_range(0.0..jitter.as_secs_f64())
    };
    Duration::from_secs_f64(exp + jitter_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_each_attempt() {
        let base = Duration::from_millis(100);
        let zero_jitter = Duration::from_millis(0);
        assert_eq!(delay_for(1, base, zero_jitter), Duration::from_millis(100));
        assert_eq!(delay_for(2, base, zero_jitter), Duration::from_millis(200));
        assert_eq!(delay_for(3, base, zero_jitter), Duration::from_millis(400));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let base = Duration::from_millis(100);
        let jitter = Duration::from_millis(100);
        for _ in 0..50 {
            let d = delay_for(1, base, jitter);
            assert!(d.as_millis() >= 100);
            assert!(d.as_millis() < 200);
        }
    }

    #[test]
    fn timeout_and_http_are_retriable() {
        assert!(is_retriable(&Error::Timeout("x".into())));
        assert!(is_retriable(&Error::Http("x".into())));
    }

    #[test]
    fn config_and_other_are_not_retriable() {
        assert!(!is_retriable(&Error::Config("x".into())));
        assert!(!is_retriable(&Error::PageNotFound("x".into())));
    }
}
