use chrono::{DateTime, Duration, NaiveTime, Utc};

/// The most recent `reset_hour:00` wall-clock instant in a fixed UTC offset,
/// at or before `timestamp`.
///
/// The offset is fixed, so there is no daylight saving to account for.
pub fn last_reset_boundary(
    timestamp: DateTime<Utc>,
    reset_hour: u32,
    tz_offset_minutes: i32,
) -> DateTime<Utc> {
    let offset = Duration::minutes(i64::from(tz_offset_minutes));
    let reset = Duration::hours(i64::from(reset_hour));

    // Shifting back by the reset hour makes the reset instant land on local
    // midnight, so truncating to the day picks the right boundary.
    let shifted = timestamp.naive_utc() + offset - reset;
    let local_midnight = shifted.date().and_time(NaiveTime::MIN);

    (local_midnight + reset - offset).and_utc()
}
