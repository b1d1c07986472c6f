//! Tests for utility functions

use chrono::{FixedOffset, TimeDelta, TimeZone, Utc};
use lifecycle_kit::util::{mod_next_day, time_until};

#[test]
fn test_time_until_in_past_without_rollover() {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
    assert_eq!(time_until(&now, 9, 0, 0, false), Some(TimeDelta::hours(-1)));
}

#[test]
fn test_time_until_respects_offset() {
    let tz = FixedOffset::east_opt(2 * 3600).unwrap();
    let now = tz.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).unwrap();
    assert_eq!(time_until(&now, 1, 0, 0, true), Some(TimeDelta::hours(2)));
}

#[test]
fn test_time_until_rejects_invalid_time() {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
    assert_eq!(time_until(&now, 25, 0, 0, true), None);
}

#[test]
fn test_mod_next_day_boundaries() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let mid = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
    assert_eq!(mod_next_day(&start, &mid, 7), Some(TimeDelta::days(2) + TimeDelta::hours(12)));

    let on_boundary = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
    assert_eq!(mod_next_day(&start, &on_boundary, 7), Some(TimeDelta::zero()));

    assert_eq!(mod_next_day(&start, &mid, 0), None);
}

#[test]
fn test_mod_next_day_future_start() {
    let start = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap();
    assert_eq!(mod_next_day(&start, &now, 3), Some(TimeDelta::days(1)));
}

#[test]
fn test_init_tracing_is_idempotent() {
    lifecycle_kit::util::init_tracing();
    lifecycle_kit::util::init_tracing();
    tracing::info!(component = "util_test", "tracing initialised");
}
