//! Expiry health classification.

use chrono::{DateTime, TimeDelta, Utc};

use crate::types::ExpiryStatus;

/// Days left at or below which a secret is critical.
pub const CRITICAL_DAYS: i64 = 2;

/// Days left at or below which a secret needs attention.
pub const WARNING_DAYS: i64 = 7;

/// Classifies an optional expiry timestamp against `now`.
///
/// Returns the status and the whole days remaining. An expired secret
/// reports 0 days rather than how overdue it is.
#[must_use]
pub fn classify(
    expires_on: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> (ExpiryStatus, Option<i64>) {
    let Some(expires_on) = expires_on else {
        return (ExpiryStatus::Healthy, None);
    };

    let delta = expires_on - now;
    if delta < TimeDelta::zero() {
        return (ExpiryStatus::Expired, Some(0));
    }

    let days = delta.num_days();
    let status = if days <= CRITICAL_DAYS {
        ExpiryStatus::Critical
    } else if days <= WARNING_DAYS {
        ExpiryStatus::Warning
    } else {
        ExpiryStatus::Healthy
    };
    (status, Some(days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use test_case::test_case;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid date")
    }

    #[test]
    fn no_expiry_is_healthy_without_days() {
        assert_eq!(classify(None, now()), (ExpiryStatus::Healthy, None));
    }

    #[test_case(TimeDelta::seconds(-1), ExpiryStatus::Expired, 0 ; "one second overdue")]
    #[test_case(TimeDelta::days(-30), ExpiryStatus::Expired, 0 ; "a month overdue")]
    #[test_case(TimeDelta::zero(), ExpiryStatus::Critical, 0 ; "expires right now")]
    #[test_case(TimeDelta::hours(20), ExpiryStatus::Critical, 0 ; "later today")]
    #[test_case(TimeDelta::hours(71), ExpiryStatus::Critical, 2 ; "almost three days")]
    #[test_case(TimeDelta::days(3), ExpiryStatus::Warning, 3 ; "three days")]
    #[test_case(TimeDelta::days(7) + TimeDelta::hours(5), ExpiryStatus::Warning, 7 ; "seven days")]
    #[test_case(TimeDelta::days(8), ExpiryStatus::Healthy, 8 ; "eight days")]
    #[test_case(TimeDelta::days(365), ExpiryStatus::Healthy, 365 ; "a year")]
    fn classify_boundaries(offset: TimeDelta, status: ExpiryStatus, days: i64) {
        assert_eq!(classify(Some(now() + offset), now()), (status, Some(days)));
    }

    proptest! {
        #[test]
        fn classification_matches_day_bands(offset_secs in -10_000_000i64..10_000_000i64) {
            let expires = now() + TimeDelta::seconds(offset_secs);
            let (status, days) = classify(Some(expires), now());

            if offset_secs < 0 {
                prop_assert_eq!(status, ExpiryStatus::Expired);
                prop_assert_eq!(days, Some(0));
            } else {
                let whole_days = offset_secs / 86_400;
                prop_assert_eq!(days, Some(whole_days));
                let expected = match whole_days {
                    0..=2 => ExpiryStatus::Critical,
                    3..=7 => ExpiryStatus::Warning,
                    _ => ExpiryStatus::Healthy,
                };
                prop_assert_eq!(status, expected);
            }
        }
    }
}
