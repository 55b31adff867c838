//! Weekday Scheduling
//!
//! Helpers for plugins that act at a fixed weekday and time of day.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};

/// Next instant strictly after `from` that falls on `weekday` at `hour:minute`
/// UTC, together with the delay until then.
///
/// Returns `None` when `hour`/`minute` do not form a valid time of day.
pub fn next_weekday_time(
    from: DateTime<Utc>,
    weekday: Weekday,
    hour: u32,
    minute: u32,
) -> Option<(DateTime<Utc>, Duration)> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;

    let today = from.weekday().num_days_from_sunday() as i64;
    let wanted = weekday.num_days_from_sunday() as i64;
    let delta = (wanted - today + 7) % 7;

    let mut next = (from.date_naive() + Duration::days(delta))
        .and_time(time)
        .and_utc();
    if next <= from {
        next += Duration::days(7);
    }

    Some((next, next - from))
}

/// Sleep until the next occurrence of `weekday` at `hour:minute` UTC.
pub async fn sleep_until_next_weekday_time(weekday: Weekday, hour: u32, minute: u32) {
    let Some((_, delay)) = next_weekday_time(Utc::now(), weekday, hour, minute) else {
        tracing::warn!(hour, minute, "Invalid weekday schedule time");
        return;
    };
    if let Ok(delay) = delay.to_std() {
        tokio::time::sleep(delay).await;
    }
}
