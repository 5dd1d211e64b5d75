//! src/cache/freshness.rs
//!
//! Time-to-live validity and last-access stamping. The backing store
//! treats object bodies as immutable, so the last-access timestamp lives
//! in a mutable tag rather than in object metadata.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Tag recording an object's last write or last successful read, as an
/// epoch-millisecond string.
pub const LAST_ACCESS_TIME_TAG: &str = "LastAccessTime";

/// Decides whether a stored entry is still valid given its last-access
/// timestamp.
#[derive(Clone, Copy, Debug)]
pub struct FreshnessPolicy {
    ttl_seconds: i64,
}

impl FreshnessPolicy {
    /// A policy with the given time-to-live; zero or negative means
    /// entries never expire.
    pub fn new(ttl_seconds: i64) -> Self {
        Self { ttl_seconds }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Earliest instant a valid entry may carry, at whole-second
    /// resolution to tolerate clock and metadata granularity. The epoch
    /// when the ttl is unbounded.
    pub fn earliest_valid_instant(&self) -> DateTime<Utc> {
        if self.ttl_seconds <= 0 {
            return DateTime::UNIX_EPOCH;
        }
        DateTime::from_timestamp(Utc::now().timestamp() - self.ttl_seconds, 0)
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn is_valid(&self, last: DateTime<Utc>) -> bool {
        self.ttl_seconds <= 0 || last > self.earliest_valid_instant()
    }
}

/// A fresh last-access tag pair stamped with the current time.
pub fn new_last_access_tag() -> (String, String) {
    (
        LAST_ACCESS_TIME_TAG.to_string(),
        Utc::now().timestamp_millis().to_string(),
    )
}

/// Extracts the last-access timestamp from an object's tag set, if present
/// and parseable.
pub fn parse_last_access(tags: &HashMap<String, String>) -> Option<DateTime<Utc>> {
    tags.get(LAST_ACCESS_TIME_TAG)?
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn unbounded_ttl_is_always_valid() {
        let policy = FreshnessPolicy::unbounded();
        assert!(policy.is_valid(DateTime::UNIX_EPOCH));
        assert!(policy.is_valid(Utc::now() - Duration::days(10_000)));
        assert_eq!(FreshnessPolicy::new(-5).earliest_valid_instant(), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn bounded_ttl_expires_old_entries() {
        let policy = FreshnessPolicy::new(60);
        assert!(policy.is_valid(Utc::now()));
        assert!(!policy.is_valid(Utc::now() - Duration::seconds(120)));
    }

    #[test]
    fn validity_is_monotonic_in_ttl() {
        // Increasing the ttl can only turn an invalid record valid, never
        // the reverse.
        let last = Utc::now() - Duration::seconds(90);
        let mut was_valid = false;
        for ttl in [1i64, 30, 60, 89, 120, 3600, 0] {
            let valid = FreshnessPolicy::new(ttl).is_valid(last);
            if was_valid {
                assert!(valid, "ttl={} regressed to invalid", ttl);
            }
            was_valid = valid;
        }
        assert!(was_valid);
    }

    #[test]
    fn tag_round_trip() {
        let (name, value) = new_last_access_tag();
        let tags = HashMap::from([(name, value)]);
        let parsed = parse_last_access(&tags).unwrap();
        assert!((Utc::now() - parsed).num_seconds() < 5);

        assert!(parse_last_access(&HashMap::new()).is_none());
        let garbage = HashMap::from([(LAST_ACCESS_TIME_TAG.to_string(), "soon".to_string())]);
        assert!(parse_last_access(&garbage).is_none());
    }
}
