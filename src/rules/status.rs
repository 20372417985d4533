//! Status derivation for a single attendance day.
//!
//! All inputs are office-local wall times. Thresholds are whole minutes and
//! comparisons are inclusive of the threshold itself: arriving exactly
//! `late_threshold_minutes` after office start is still on time.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use super::RuleViolation;
use crate::model::attendance::AttendanceStatus;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttendancePolicy {
    pub office_start: NaiveTime,
    pub office_end: NaiveTime,
    pub late_threshold_minutes: i64,
    pub half_day_threshold_minutes: i64,
    pub early_leave_threshold_minutes: i64,
    /// Share of the expected day below which the day counts as half.
    pub half_day_ratio: f64,
    /// Share of the expected day below which the day counts as absent.
    pub absent_ratio: f64,
}

impl AttendancePolicy {
    pub fn expected_minutes(&self) -> i64 {
        (self.office_end - self.office_start).num_minutes()
    }

    fn ratio(&self, worked_minutes: i64) -> f64 {
        let expected = self.expected_minutes();
        if expected <= 0 {
            return 0.0;
        }
        worked_minutes as f64 / expected as f64
    }
}

/// A closed interval of presence, in office-local time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Span {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn on(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        Self::new(date.and_time(start), date.and_time(end))
    }
}

/// Total minutes covered by the spans, counting overlaps once.
pub fn union_minutes(spans: &[Span]) -> i64 {
    let mut sorted: Vec<Span> = spans.iter().copied().filter(|s| s.end > s.start).collect();
    sorted.sort_by_key(|s| s.start);

    let mut total = Duration::zero();
    let mut current: Option<Span> = None;

    for span in sorted {
        current = match current {
            Some(open) if span.start <= open.end => {
                Some(Span::new(open.start, open.end.max(span.end)))
            }
            Some(open) => {
                total += open.end - open.start;
                Some(span)
            }
            None => Some(span),
        };
    }
    if let Some(open) = current {
        total += open.end - open.start;
    }
    total.num_minutes()
}

pub fn classify_check_in(policy: &AttendancePolicy, at: NaiveTime) -> AttendanceStatus {
    let offset = (at - policy.office_start).num_minutes();
    if offset <= policy.late_threshold_minutes {
        AttendanceStatus::Present
    } else if offset <= policy.half_day_threshold_minutes {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::HalfDay
    }
}

/// Check-in classification when the employee may have started in the field:
/// the earlier of the two start times wins.
pub fn classify_arrival(
    policy: &AttendancePolicy,
    check_in: NaiveTime,
    outdoor_duty_start: Option<NaiveTime>,
) -> AttendanceStatus {
    let effective = match outdoor_duty_start {
        Some(start) => start.min(check_in),
        None => check_in,
    };
    classify_check_in(policy, effective)
}

/// Status for a day made of outdoor duty alone, or any plain worked total.
pub fn classify_worked(policy: &AttendancePolicy, worked_minutes: i64) -> AttendanceStatus {
    let ratio = policy.ratio(worked_minutes);
    if ratio < policy.absent_ratio {
        AttendanceStatus::Absent
    } else if ratio < policy.half_day_ratio {
        AttendanceStatus::HalfDay
    } else {
        AttendanceStatus::Present
    }
}

/// A check-in may only fill a row that has none yet and is not a leave day.
pub fn ensure_check_in_allowed(
    status: AttendanceStatus,
    checked_in: bool,
) -> Result<(), RuleViolation> {
    if checked_in {
        Err(RuleViolation::AlreadyCheckedIn)
    } else if status == AttendanceStatus::OnLeave {
        Err(RuleViolation::OnLeave)
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CheckOutInput {
    pub check_in: NaiveDateTime,
    pub check_out: NaiveDateTime,
    pub check_in_status: AttendanceStatus,
    /// Approved outdoor duty windows of the same day
    pub outdoor_duties: Vec<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayOutcome {
    pub status: AttendanceStatus,
    pub work_hours: f64,
}

pub fn classify_check_out(
    policy: &AttendancePolicy,
    input: &CheckOutInput,
) -> Result<DayOutcome, RuleViolation> {
    if input.check_out < input.check_in {
        return Err(RuleViolation::CheckOutBeforeCheckIn);
    }

    let mut spans = vec![Span::new(input.check_in, input.check_out)];
    spans.extend(input.outdoor_duties.iter().copied());
    let worked = union_minutes(&spans);

    let last_presence = spans.iter().map(|s| s.end).max().unwrap_or(input.check_out);
    let cutoff = input.check_in.date().and_time(policy.office_end)
        - Duration::minutes(policy.early_leave_threshold_minutes);

    let base = match input.check_in_status {
        AttendanceStatus::Late => AttendanceStatus::Late,
        AttendanceStatus::HalfDay => AttendanceStatus::HalfDay,
        _ => AttendanceStatus::Present,
    };

    let ratio = policy.ratio(worked);
    let status = if ratio < policy.absent_ratio {
        AttendanceStatus::Absent
    } else if ratio < policy.half_day_ratio || base == AttendanceStatus::HalfDay {
        AttendanceStatus::HalfDay
    } else if last_presence < cutoff {
        AttendanceStatus::EarlyLeave
    } else {
        base
    };

    Ok(DayOutcome {
        status,
        work_hours: minutes_to_hours(worked),
    })
}

pub fn minutes_to_hours(minutes: i64) -> f64 {
    (minutes as f64 / 60.0 * 100.0).round() / 100.0
}

#[cfg(test)]
pub(crate) fn test_policy() -> AttendancePolicy {
    AttendancePolicy {
        office_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        office_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        late_threshold_minutes: 30,
        half_day_threshold_minutes: 120,
        early_leave_threshold_minutes: 30,
        half_day_ratio: 0.5,
        absent_ratio: 0.25,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AttendanceStatus::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn dt(h: u32, m: u32) -> NaiveDateTime {
        day().and_time(t(h, m))
    }

    #[test]
    fn check_in_thresholds() {
        let policy = test_policy();
        let cases = [
            (t(8, 59), Present),
            (t(9, 0), Present),
            (t(9, 30), Present),
            (t(9, 31), Late),
            (t(11, 0), Late),
            (t(11, 1), HalfDay),
            (t(17, 0), HalfDay),
        ];
        for (at, expected) in cases {
            assert_eq!(classify_check_in(&policy, at), expected, "check-in at {at}");
        }
    }

    #[test]
    fn check_in_on_existing_rows() {
        assert_eq!(ensure_check_in_allowed(Absent, false), Ok(()));
        assert_eq!(ensure_check_in_allowed(Present, false), Ok(()));
        assert_eq!(
            ensure_check_in_allowed(OnLeave, false),
            Err(RuleViolation::OnLeave)
        );
        assert_eq!(
            ensure_check_in_allowed(Late, true),
            Err(RuleViolation::AlreadyCheckedIn)
        );
    }

    #[test]
    fn outdoor_duty_start_counts_as_arrival() {
        let policy = test_policy();
        assert_eq!(classify_arrival(&policy, t(12, 0), Some(t(9, 0))), Present);
        assert_eq!(classify_arrival(&policy, t(9, 10), Some(t(14, 0))), Present);
        assert_eq!(classify_arrival(&policy, t(10, 0), None), Late);
    }

    #[test]
    fn check_out_classification() {
        let policy = test_policy();
        let cases = [
            // full day keeps the arrival status
            (dt(9, 0), dt(18, 0), Present, Present),
            (dt(9, 45), dt(18, 0), Late, Late),
            // leaving more than 30 minutes before 18:00
            (dt(9, 0), dt(17, 0), Present, EarlyLeave),
            (dt(9, 0), dt(17, 30), Present, Present),
            // 4h of a 9h day is below half
            (dt(9, 0), dt(13, 0), Present, HalfDay),
            // 2h is below a quarter
            (dt(9, 0), dt(11, 0), Present, Absent),
            // half-day arrival stays half-day even with full hours after it
            (dt(11, 30), dt(20, 30), HalfDay, HalfDay),
        ];
        for (check_in, check_out, arrival, expected) in cases {
            let outcome = classify_check_out(
                &policy,
                &CheckOutInput {
                    check_in,
                    check_out,
                    check_in_status: arrival,
                    outdoor_duties: Vec::new(),
                },
            )
            .unwrap();
            assert_eq!(outcome.status, expected, "{check_in} - {check_out}");
        }
    }

    #[test]
    fn work_hours_are_rounded() {
        let outcome = classify_check_out(
            &test_policy(),
            &CheckOutInput {
                check_in: dt(9, 0),
                check_out: dt(17, 50),
                check_in_status: Present,
                outdoor_duties: Vec::new(),
            },
        )
        .unwrap();
        assert_eq!(outcome.work_hours, 8.83);
    }

    #[test]
    fn outdoor_duty_extends_the_day_without_double_counting() {
        let policy = test_policy();
        let outcome = classify_check_out(
            &policy,
            &CheckOutInput {
                check_in: dt(9, 0),
                check_out: dt(14, 0),
                check_in_status: Present,
                outdoor_duties: vec![Span::new(dt(13, 0), dt(18, 0))],
            },
        )
        .unwrap();
        assert_eq!(outcome.status, Present);
        assert_eq!(outcome.work_hours, 9.0);
    }

    #[test]
    fn check_out_before_check_in_is_rejected() {
        let result = classify_check_out(
            &test_policy(),
            &CheckOutInput {
                check_in: dt(10, 0),
                check_out: dt(9, 0),
                check_in_status: Present,
                outdoor_duties: Vec::new(),
            },
        );
        assert_eq!(result, Err(RuleViolation::CheckOutBeforeCheckIn));
    }

    #[test]
    fn outdoor_duty_only_days() {
        let policy = test_policy();
        assert_eq!(classify_worked(&policy, 9 * 60), Present);
        assert_eq!(classify_worked(&policy, 5 * 60), Present);
        assert_eq!(classify_worked(&policy, 3 * 60), HalfDay);
        assert_eq!(classify_worked(&policy, 60), Absent);
    }

    #[test]
    fn union_merges_overlaps_and_keeps_gaps() {
        let spans = [
            Span::new(dt(9, 0), dt(12, 0)),
            Span::new(dt(11, 0), dt(13, 0)),
            Span::new(dt(14, 0), dt(15, 0)),
            // inverted spans are ignored
            Span::new(dt(16, 0), dt(15, 0)),
        ];
        assert_eq!(union_minutes(&spans), 5 * 60);
        assert_eq!(union_minutes(&[]), 0);
    }

    #[test]
    fn degenerate_office_hours_never_divide_by_zero() {
        let mut policy = test_policy();
        policy.office_end = policy.office_start;
        assert_eq!(classify_worked(&policy, 480), Absent);
    }
}
