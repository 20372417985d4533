//! Planning for the auto-checkout sweep.
//!
//! Employees who check in and then leave on outdoor duty that runs past
//! office hours never come back to check out. Once the duty window has
//! ended their day is closed at the duty end time.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};

use super::clock::{at_local, to_local};
use super::status::{AttendancePolicy, CheckOutInput, Span, classify_check_out};
use crate::model::attendance::AttendanceStatus;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyWindow {
    pub id: u64,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// An open attendance day together with every approved duty of that day.
#[derive(Debug, Clone)]
pub struct SweepCandidate {
    pub attendance_id: u64,
    pub user_id: u64,
    pub date: NaiveDate,
    pub check_in: DateTime<Utc>,
    pub check_in_status: AttendanceStatus,
    pub duties: Vec<DutyWindow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCheckout {
    pub attendance_id: u64,
    pub user_id: u64,
    pub duty_id: u64,
    pub check_out: DateTime<Utc>,
    pub status: AttendanceStatus,
    pub work_hours: f64,
}

pub fn plan_auto_checkouts(
    candidates: &[SweepCandidate],
    policy: &AttendancePolicy,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> Vec<PlannedCheckout> {
    candidates
        .iter()
        .filter_map(|c| {
            let last = c.duties.iter().max_by_key(|d| d.end)?;
            if last.end < policy.office_end {
                return None;
            }
            let check_out = at_local(c.date, last.end, offset);
            if check_out > now || check_out < c.check_in {
                return None;
            }
            let input = CheckOutInput {
                check_in: to_local(c.check_in, offset),
                check_out: to_local(check_out, offset),
                check_in_status: c.check_in_status,
                outdoor_duties: c
                    .duties
                    .iter()
                    .map(|d| Span::on(c.date, d.start, d.end))
                    .collect(),
            };
            let outcome = classify_check_out(policy, &input).ok()?;
            Some(PlannedCheckout {
                attendance_id: c.attendance_id,
                user_id: c.user_id,
                duty_id: last.id,
                check_out,
                status: outcome.status,
                work_hours: outcome.work_hours,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::clock::office_offset;
    use crate::rules::status::test_policy;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn candidate(id: u64, duties: &[(NaiveTime, NaiveTime)]) -> SweepCandidate {
        SweepCandidate {
            attendance_id: id,
            user_id: id * 10,
            date: day(),
            check_in: at_local(day(), t(9, 5), office_offset(330)),
            check_in_status: AttendanceStatus::Present,
            duties: duties
                .iter()
                .enumerate()
                .map(|(i, &(start, end))| DutyWindow {
                    id: id * 100 + i as u64,
                    start,
                    end,
                })
                .collect(),
        }
    }

    #[test]
    fn closes_days_whose_duty_spans_office_end() {
        let offset = office_offset(330);
        let now = at_local(day(), t(19, 0), offset);
        let candidates = [
            candidate(1, &[(t(14, 0), t(18, 30))]),
            // ends before office end, employee is expected back
            candidate(2, &[(t(11, 0), t(15, 0))]),
            // still out in the field
            candidate(3, &[(t(15, 0), t(20, 0))]),
            candidate(4, &[]),
        ];

        let plan = plan_auto_checkouts(&candidates, &test_policy(), offset, now);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].attendance_id, 1);
        assert_eq!(plan[0].duty_id, 100);
        assert_eq!(plan[0].check_out, at_local(day(), t(18, 30), offset));
        assert_eq!(plan[0].status, AttendanceStatus::Present);
        assert_eq!(plan[0].work_hours, 9.42);
    }

    #[test]
    fn latest_duty_decides_the_check_out() {
        let offset = office_offset(0);
        let c = candidate(5, &[(t(16, 0), t(18, 15)), (t(10, 0), t(12, 0))]);
        let now = at_local(day(), t(22, 0), offset);

        let plan = plan_auto_checkouts(&[c], &test_policy(), offset, now);
        assert_eq!(plan[0].duty_id, 500);
        assert_eq!(plan[0].check_out, at_local(day(), t(18, 15), offset));
    }

    #[test]
    fn late_arrival_status_carries_over() {
        let offset = office_offset(0);
        let mut late = candidate(4, &[(t(13, 0), t(18, 0))]);
        late.check_in = at_local(day(), t(10, 0), offset);
        late.check_in_status = AttendanceStatus::Late;

        let now = at_local(day(), t(23, 0), offset);
        let plan = plan_auto_checkouts(&[late], &test_policy(), offset, now);
        assert_eq!(plan[0].status, AttendanceStatus::Late);
        assert_eq!(plan[0].work_hours, 8.0);
    }
}
