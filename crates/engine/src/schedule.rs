//! Due-date calculation. Pure functions of `now` and the step list.

use chrono::{DateTime, Duration, Utc};

use crate::types::Step;

const SECS_PER_DAY: f64 = 86_400.0;

/// `now + delay_days`, rounded to whole seconds. Saturates at the maximum
/// representable instant instead of overflowing.
pub fn due_at(now: DateTime<Utc>, delay_days: f64) -> DateTime<Utc> {
    let secs = (delay_days.max(0.0) * SECS_PER_DAY).round();
    if secs >= i64::MAX as f64 {
        return DateTime::<Utc>::MAX_UTC;
    }
    Duration::try_seconds(secs as i64)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Due date for the step at `index`, or `None` when the steps are exhausted.
pub fn next_due(now: DateTime<Utc>, steps: &[Step], index: usize) -> Option<DateTime<Utc>> {
    steps.get(index).map(|step| due_at(now, step.delay_days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::types::Channel;

    #[test]
    fn test_due_at_whole_and_fractional_days() {
        let now = Utc::now();
        assert_eq!(due_at(now, 0.0), now);
        assert_eq!(due_at(now, 2.0), now + Duration::days(2));
        assert_eq!(due_at(now, 0.5), now + Duration::hours(12));
    }

    #[test]
    fn test_due_at_saturates() {
        let now = Utc::now();
        assert_eq!(due_at(now, 1e300), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_next_due_past_end_is_none() {
        let now = Utc::now();
        let steps = vec![Step::new(Channel::Email, 0.0), Step::new(Channel::Call, 3.0)];
        assert_eq!(next_due(now, &steps, 1), Some(now + Duration::days(3)));
        assert_eq!(next_due(now, &steps, 2), None);
    }
}
