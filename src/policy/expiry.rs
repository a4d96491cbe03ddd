use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Instant at which a resource created at `created_at` outlives `ttl`.
///
/// `None` when the sum is not representable.
pub fn expires_at(created_at: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    let ttl = TimeDelta::from_std(ttl).ok()?;
    created_at.checked_add_signed(ttl)
}

/// `created_at + ttl <= now`.
///
/// The boundary instant counts as expired so a resource evaluated exactly at
/// its deadline does not survive one more pass.
pub fn is_expired(created_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    match expires_at(created_at, ttl) {
        Some(deadline) => deadline <= now,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let ttl = Duration::from_secs(60);
        let deadline = created() + TimeDelta::seconds(60);
        assert!(is_expired(created(), ttl, deadline));
        assert!(!is_expired(created(), ttl, deadline - TimeDelta::nanoseconds(1)));
    }

    #[test]
    fn test_zero_ttl_expires_on_sight() {
        assert!(is_expired(created(), Duration::ZERO, created()));
        assert!(is_expired(created(), Duration::ZERO, created() + TimeDelta::seconds(5)));
    }

    #[test]
    fn test_resource_from_the_future_is_not_expired() {
        let now = created() - TimeDelta::seconds(1);
        assert!(!is_expired(created(), Duration::ZERO, now));
    }

    #[test]
    fn test_unrepresentable_deadline_never_expires() {
        let ttl = Duration::from_secs(u64::MAX);
        assert_eq!(expires_at(created(), ttl), None);
        assert!(!is_expired(created(), ttl, DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn test_expires_at_adds_ttl() {
        let deadline = expires_at(created(), Duration::from_secs(90)).unwrap();
        assert_eq!(deadline, Utc.with_ymd_and_hms(2024, 5, 1, 12, 1, 30).unwrap());
    }
}
