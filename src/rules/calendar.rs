use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};

use super::RuleViolation;

/// Weekly off days plus the holiday list of the organization.
#[derive(Debug, Clone, Default)]
pub struct WorkCalendar {
    weekly_offs: Vec<Weekday>,
    holidays: HashSet<NaiveDate>,
}

impl WorkCalendar {
    pub fn new(weekly_offs: Vec<Weekday>, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            weekly_offs,
            holidays: holidays.into_iter().collect(),
        }
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    pub fn is_off_day(&self, date: NaiveDate) -> bool {
        self.weekly_offs.contains(&date.weekday()) || self.is_holiday(date)
    }

    /// Working days of the inclusive range, in order.
    pub fn working_days(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| !self.is_off_day(*d))
            .collect()
    }

    pub fn count_working_days(&self, start: NaiveDate, end: NaiveDate) -> i32 {
        self.working_days(start, end).len() as i32
    }
}

/// Parses a comma separated weekday list such as `Sat,Sun`.
pub fn parse_weekly_offs(raw: &str) -> Result<Vec<Weekday>, RuleViolation> {
    let mut days = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let day: Weekday = part
            .parse()
            .map_err(|_| RuleViolation::InvalidSettings(format!("Unknown weekday: {part}")))?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn calendar() -> WorkCalendar {
        // 2025-06-06 is a Friday
        WorkCalendar::new(vec![Weekday::Sat, Weekday::Sun], [d(2025, 6, 6)])
    }

    #[test]
    fn skips_weekends_and_holidays() {
        let cal = calendar();
        // Mon 2 .. Sun 15: ten weekdays, one of them a holiday
        assert_eq!(cal.count_working_days(d(2025, 6, 2), d(2025, 6, 15)), 9);
        assert_eq!(cal.count_working_days(d(2025, 6, 7), d(2025, 6, 8)), 0);
        assert_eq!(
            cal.working_days(d(2025, 6, 5), d(2025, 6, 9)),
            vec![d(2025, 6, 5), d(2025, 6, 9)]
        );
    }

    #[test]
    fn reversed_range_is_empty() {
        assert!(calendar().working_days(d(2025, 6, 9), d(2025, 6, 2)).is_empty());
    }

    #[test]
    fn off_days() {
        let cal = calendar();
        assert!(cal.is_off_day(d(2025, 6, 7)));
        assert!(cal.is_off_day(d(2025, 6, 6)));
        assert!(cal.is_holiday(d(2025, 6, 6)));
        assert!(!cal.is_off_day(d(2025, 6, 4)));
    }

    #[test]
    fn weekday_lists() {
        assert_eq!(
            parse_weekly_offs("Sat, sun,Sat").unwrap(),
            vec![Weekday::Sat, Weekday::Sun]
        );
        assert_eq!(parse_weekly_offs("").unwrap(), Vec::<Weekday>::new());
        assert!(parse_weekly_offs("Sat,Funday").is_err());
    }
}
