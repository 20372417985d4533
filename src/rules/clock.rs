//! Conversions between stored UTC instants and office-local wall time.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};

pub fn office_offset(utc_offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
}

pub fn to_local(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDateTime {
    at.with_timezone(&offset).naive_local()
}

pub fn to_utc(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    (local - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
}

pub fn local_today(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    to_local(now, offset).date()
}

pub fn at_local(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    to_utc(date.and_time(time), offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_conversion_shifts_by_offset() {
        let ist = office_offset(330);
        let at = NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(3, 30, 0)
            .unwrap()
            .and_utc();

        let local = to_local(at, ist);
        assert_eq!(local.time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(to_utc(local, ist), at);
    }

    #[test]
    fn local_date_can_differ_from_utc_date() {
        let offset = office_offset(-300);
        let at = NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_opt(2, 0, 0)
            .unwrap()
            .and_utc();
        assert_eq!(
            local_today(at, offset),
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
        );
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        assert_eq!(office_offset(24 * 60).local_minus_utc(), 0);
    }
}
