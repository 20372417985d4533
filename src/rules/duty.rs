use chrono::{NaiveDateTime, NaiveTime};

use super::RuleViolation;
use super::status::{
    AttendancePolicy, CheckOutInput, DayOutcome, Span, classify_arrival, classify_check_out,
    classify_worked, minutes_to_hours, union_minutes,
};
use crate::model::attendance::AttendanceStatus;

pub fn validate_window(start: NaiveTime, end: NaiveTime) -> Result<(), RuleViolation> {
    if start < end {
        Ok(())
    } else {
        Err(RuleViolation::InvalidTimeWindow)
    }
}

/// Half-open windows: a duty ending at 12:00 does not clash with one
/// starting at 12:00.
pub fn windows_overlap(a: (NaiveTime, NaiveTime), b: (NaiveTime, NaiveTime)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Fails when `window` overlaps any of `existing`.
pub fn ensure_no_overlap<'a>(
    window: (NaiveTime, NaiveTime),
    existing: impl IntoIterator<Item = &'a (NaiveTime, NaiveTime)>,
) -> Result<(), RuleViolation> {
    if existing.into_iter().any(|other| windows_overlap(window, *other)) {
        Err(RuleViolation::Overlap("outdoor duty".into()))
    } else {
        Ok(())
    }
}

/// Attendance row already recorded for the day of a duty being approved.
#[derive(Debug, Clone, Copy)]
pub struct ExistingDay {
    pub status: AttendanceStatus,
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DutyApproval {
    /// No row yet: record an outdoor-duty-only day.
    Insert(DayOutcome),
    /// Still on the clock: check-out or the sweep finalizes the day.
    LinkOnly,
    /// Rewrite status and hours of the existing row.
    Recompute(DayOutcome),
}

fn duty_only(policy: &AttendancePolicy, duties: &[Span]) -> DayOutcome {
    let worked = union_minutes(duties);
    DayOutcome {
        status: classify_worked(policy, worked),
        work_hours: minutes_to_hours(worked),
    }
}

/// What approving a duty does to the day's attendance. `duties` holds every
/// approved window of that day, the new one included.
pub fn plan_duty_approval(
    policy: &AttendancePolicy,
    existing: Option<&ExistingDay>,
    duties: &[Span],
) -> Result<DutyApproval, RuleViolation> {
    let Some(day) = existing else {
        return Ok(DutyApproval::Insert(duty_only(policy, duties)));
    };
    if day.status == AttendanceStatus::OnLeave {
        return Err(RuleViolation::Overlap("leave".into()));
    }

    match (day.check_in, day.check_out) {
        (Some(_), None) => Ok(DutyApproval::LinkOnly),
        (Some(check_in), Some(check_out)) => {
            let first_start = duties.iter().map(|d| d.start.time()).min();
            let outcome = classify_check_out(
                policy,
                &CheckOutInput {
                    check_in,
                    check_out,
                    check_in_status: classify_arrival(policy, check_in.time(), first_start),
                    outdoor_duties: duties.to_vec(),
                },
            )?;
            Ok(DutyApproval::Recompute(outcome))
        }
        // An absent day without a check-in becomes an outdoor-duty day
        _ => Ok(DutyApproval::Recompute(duty_only(policy, duties))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::status::test_policy;
    use AttendanceStatus::*;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn window_must_move_forward() {
        assert!(validate_window(t(9, 0), t(12, 0)).is_ok());
        assert_eq!(validate_window(t(12, 0), t(12, 0)), Err(RuleViolation::InvalidTimeWindow));
        assert_eq!(validate_window(t(13, 0), t(12, 0)), Err(RuleViolation::InvalidTimeWindow));
    }

    #[test]
    fn overlap_cases() {
        let morning = (t(9, 0), t(12, 0));
        let cases = [
            ((t(12, 0), t(14, 0)), false),
            ((t(11, 59), t(14, 0)), true),
            ((t(7, 0), t(9, 0)), false),
            ((t(10, 0), t(11, 0)), true),
            ((t(8, 0), t(18, 0)), true),
        ];
        for (other, expected) in cases {
            assert_eq!(windows_overlap(morning, other), expected, "{other:?}");
            assert_eq!(windows_overlap(other, morning), expected, "{other:?} reversed");
        }
    }

    #[test]
    fn overlap_against_existing() {
        let existing = [(t(9, 0), t(12, 0)), (t(14, 0), t(16, 0))];
        assert!(ensure_no_overlap((t(12, 0), t(14, 0)), &existing).is_ok());
        assert!(ensure_no_overlap((t(15, 0), t(17, 0)), &existing).is_err());
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap().and_time(t(h, m))
    }

    fn row(
        status: AttendanceStatus,
        check_in: Option<NaiveDateTime>,
        check_out: Option<NaiveDateTime>,
    ) -> ExistingDay {
        ExistingDay {
            status,
            check_in,
            check_out,
        }
    }

    #[test]
    fn approval_effect_on_the_day() {
        let policy = test_policy();
        let afternoon = [Span::new(at(14, 0), at(18, 0))];
        let short = [Span::new(at(10, 0), at(11, 30))];

        // 4h of field work alone is below half a day
        assert_eq!(
            plan_duty_approval(&policy, None, &afternoon),
            Ok(DutyApproval::Insert(DayOutcome {
                status: HalfDay,
                work_hours: 4.0
            }))
        );

        let open = row(Present, Some(at(9, 0)), None);
        assert_eq!(
            plan_duty_approval(&policy, Some(&open), &afternoon),
            Ok(DutyApproval::LinkOnly)
        );

        // Left at 13:00 for the client visit: union covers the full day
        let closed = row(HalfDay, Some(at(9, 0)), Some(at(13, 0)));
        assert_eq!(
            plan_duty_approval(&policy, Some(&closed), &afternoon),
            Ok(DutyApproval::Recompute(DayOutcome {
                status: Present,
                work_hours: 8.0
            }))
        );

        let absent = row(Absent, None, None);
        assert_eq!(
            plan_duty_approval(&policy, Some(&absent), &short),
            Ok(DutyApproval::Recompute(DayOutcome {
                status: Absent,
                work_hours: 1.5
            }))
        );
    }

    #[test]
    fn leave_days_are_left_alone() {
        let policy = test_policy();
        let short = [Span::new(at(10, 0), at(11, 30))];
        let on_leave = row(OnLeave, None, None);

        assert_eq!(
            plan_duty_approval(&policy, Some(&on_leave), &short),
            Err(RuleViolation::Overlap("leave".into()))
        );
    }
}
