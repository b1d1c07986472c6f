//! Wall-clock helpers for computing scheduler start delays.
//!
//! `Scheduler::start` takes a relative `start_in`; these helpers turn
//! "every day at 03:00" or "every 15 days since the epoch of a contract"
//! into that delay.

use chrono::{DateTime, Days, NaiveTime, TimeDelta, TimeZone};

/// Duration from `now` until `hour:min:sec` on the same calendar day.
///
/// When the target is already in the past and `next_day` is set, the target
/// moves to the same time tomorrow; otherwise the returned delta is negative.
/// Returns `None` for an out-of-range time or a local time that does not exist
/// (DST gap).
pub fn time_until<Tz: TimeZone>(
    now: &DateTime<Tz>,
    hour: u32,
    min: u32,
    sec: u32,
    next_day: bool,
) -> Option<TimeDelta> {
    let at = NaiveTime::from_hms_opt(hour, min, sec)?;
    let tz = now.timezone();
    let mut date = now.date_naive();
    let mut target = tz.from_local_datetime(&date.and_time(at)).earliest()?;

    if next_day && target < *now {
        date = date.checked_add_days(Days::new(1))?;
        target = tz.from_local_datetime(&date.and_time(at)).earliest()?;
    }

    Some(target.signed_duration_since(now.clone()))
}

/// Duration from `now` until the next boundary that lies a multiple of `days`
/// after `start`.
///
/// A `start` in the future yields the time until `start`; a `now` exactly on a
/// boundary yields zero. Any other `now` yields the time until the next
/// boundary, including inside the first period, where that boundary is
/// `start + days`. Returns `None` when `days` is zero.
pub fn mod_next_day<Tz: TimeZone>(
    start: &DateTime<Tz>,
    now: &DateTime<Tz>,
    days: u32,
) -> Option<TimeDelta> {
    if days == 0 {
        return None;
    }
    if start >= now {
        return Some(start.clone().signed_duration_since(now.clone()));
    }

    let period = TimeDelta::days(i64::from(days));
    let elapsed = now.clone().signed_duration_since(start.clone());
    let mut periods = elapsed.num_seconds() / period.num_seconds();
    if elapsed > period * i32::try_from(periods).ok()? {
        periods += 1;
    }

    let boundary = start.clone() + period * i32::try_from(periods).ok()?;
    Some(boundary.signed_duration_since(now.clone()))
}
