use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use super::RuleViolation;
use super::calendar::WorkCalendar;
use crate::model::leave::LeaveType;

/// Validates the requested range and returns the number of working days it
/// consumes.
pub fn validate_leave_range(
    calendar: &WorkCalendar,
    leave_type: LeaveType,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<i32, RuleViolation> {
    if start > end {
        return Err(RuleViolation::InvalidDateRange);
    }
    if start.year() != end.year() {
        return Err(RuleViolation::SpansYears);
    }

    let days = calendar.count_working_days(start, end);
    if days == 0 {
        return Err(RuleViolation::NoWorkingDays);
    }
    if leave_type == LeaveType::CompOff && days != 1 {
        return Err(RuleViolation::CompOffSingleDay);
    }
    Ok(days)
}

/// `committed` is the approved plus pending days already booked this year.
pub fn check_quota(
    leave_type: LeaveType,
    quota: Option<i32>,
    committed: i32,
    requested: i32,
) -> Result<(), RuleViolation> {
    let Some(quota) = quota else {
        return Ok(());
    };
    let remaining = (quota - committed).max(0);
    if requested > remaining {
        return Err(RuleViolation::QuotaExceeded {
            leave_type,
            remaining,
            requested,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LeaveBalance {
    pub leave_type: LeaveType,
    /// `None` for leave types without a yearly quota
    pub quota: Option<i32>,
    pub used: i32,
    pub pending: i32,
    pub remaining: Option<i32>,
}

pub fn balance(leave_type: LeaveType, quota: Option<i32>, used: i32, pending: i32) -> LeaveBalance {
    LeaveBalance {
        leave_type,
        quota,
        used,
        pending,
        remaining: quota.map(|q| (q - used - pending).max(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn calendar() -> WorkCalendar {
        WorkCalendar::new(vec![Weekday::Sat, Weekday::Sun], [d(2025, 6, 6)])
    }

    #[test]
    fn counts_working_days_of_range() {
        let cal = calendar();
        assert_eq!(
            validate_leave_range(&cal, LeaveType::Casual, d(2025, 6, 2), d(2025, 6, 9)),
            Ok(5)
        );
    }

    #[test]
    fn rejects_bad_ranges() {
        let cal = calendar();
        let cases = [
            (LeaveType::Sick, d(2025, 6, 9), d(2025, 6, 2), RuleViolation::InvalidDateRange),
            (LeaveType::Sick, d(2025, 6, 7), d(2025, 6, 8), RuleViolation::NoWorkingDays),
            (LeaveType::Unpaid, d(2025, 12, 30), d(2026, 1, 2), RuleViolation::SpansYears),
            (LeaveType::CompOff, d(2025, 6, 2), d(2025, 6, 3), RuleViolation::CompOffSingleDay),
        ];
        for (leave_type, start, end, expected) in cases {
            assert_eq!(
                validate_leave_range(&cal, leave_type, start, end),
                Err(expected),
                "{leave_type} {start}..{end}"
            );
        }
    }

    #[test]
    fn comp_off_over_a_weekend_counts_one_day() {
        // Fri holiday, Sat, Sun, Mon
        assert_eq!(
            validate_leave_range(&calendar(), LeaveType::CompOff, d(2025, 6, 6), d(2025, 6, 9)),
            Ok(1)
        );
    }

    #[test]
    fn quota_checks() {
        assert!(check_quota(LeaveType::Casual, Some(12), 10, 2).is_ok());
        assert_eq!(
            check_quota(LeaveType::Casual, Some(12), 11, 2),
            Err(RuleViolation::QuotaExceeded {
                leave_type: LeaveType::Casual,
                remaining: 1,
                requested: 2
            })
        );
        assert!(check_quota(LeaveType::Unpaid, None, 400, 30).is_ok());
    }

    #[test]
    fn balance_never_negative() {
        let b = balance(LeaveType::Sick, Some(10), 8, 4);
        assert_eq!(b.remaining, Some(0));
        assert_eq!(balance(LeaveType::Unpaid, None, 3, 0).remaining, None);
    }
}
