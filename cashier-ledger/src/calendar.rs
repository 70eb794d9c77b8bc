//! Local calendar days
//!
//! Tickets carry UTC instants. Reports cut them into the cashier's calendar
//! days using a fixed UTC offset, so "today" starts at local midnight.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

/// Calendar date of `instant` at `offset`
pub fn local_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// UTC instant of local midnight opening `date`
pub fn day_start(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local_midnight = date.and_time(NaiveTime::default());
    Utc.from_utc_datetime(&(local_midnight - Duration::seconds(offset.local_minus_utc() as i64)))
}

/// UTC instant of the local midnight that opened the day containing `now`
pub fn today_start(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    day_start(local_date(now, offset), offset)
}
