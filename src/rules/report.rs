use std::collections::HashSet;

use chrono::{Months, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use super::RuleViolation;
use crate::model::attendance::AttendanceStatus;

#[derive(Debug, Default, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatusCounts {
    pub present: u32,
    pub late: u32,
    pub half_day: u32,
    pub early_leave: u32,
    pub absent: u32,
    pub on_leave: u32,
}

impl StatusCounts {
    pub fn record(&mut self, status: AttendanceStatus) {
        let slot = match status {
            AttendanceStatus::Present => &mut self.present,
            AttendanceStatus::Late => &mut self.late,
            AttendanceStatus::HalfDay => &mut self.half_day,
            AttendanceStatus::EarlyLeave => &mut self.early_leave,
            AttendanceStatus::Absent => &mut self.absent,
            AttendanceStatus::OnLeave => &mut self.on_leave,
        };
        *slot += 1;
    }

    /// Days on which the employee actually showed up, on site or in the field.
    pub fn attended(&self) -> u32 {
        self.present + self.late + self.half_day + self.early_leave
    }
}

impl FromIterator<AttendanceStatus> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = AttendanceStatus>>(iter: I) -> Self {
        let mut counts = Self::default();
        for status in iter {
            counts.record(status);
        }
        counts
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DayRecord {
    pub status: AttendanceStatus,
    pub work_hours: Option<f64>,
    pub outdoor_duty: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthlySummary {
    pub user_id: u64,
    #[schema(example = "2025-06")]
    pub month: String,
    pub counts: StatusCounts,
    pub days_recorded: u32,
    /// Days with a status other than absent or on leave
    pub days_attended: u32,
    pub total_work_hours: f64,
    /// Average over days with recorded work hours
    pub average_work_hours: f64,
    pub leave_days: i32,
    pub outdoor_duty_days: u32,
}

pub fn summarize_month(
    user_id: u64,
    month: &str,
    records: &[DayRecord],
    leave_days: i32,
) -> MonthlySummary {
    let counts: StatusCounts = records.iter().map(|r| r.status).collect();
    let worked: Vec<f64> = records
        .iter()
        .filter_map(|r| r.work_hours)
        .filter(|h| *h > 0.0)
        .collect();
    let total: f64 = worked.iter().sum();
    let average = if worked.is_empty() {
        0.0
    } else {
        total / worked.len() as f64
    };

    MonthlySummary {
        user_id,
        month: month.to_string(),
        days_attended: counts.attended(),
        counts,
        days_recorded: records.len() as u32,
        total_work_hours: round2(total),
        average_work_hours: round2(average),
        leave_days,
        outdoor_duty_days: records.iter().filter(|r| r.outdoor_duty).count() as u32,
    }
}

/// Active users without any attendance row for the day, in input order.
pub fn unmarked_users(active: &[u64], marked: &HashSet<u64>) -> Vec<u64> {
    active.iter().copied().filter(|id| !marked.contains(id)).collect()
}

/// Counts for one day over active users only.
pub fn active_counts(rows: &[(u64, AttendanceStatus)], active: &[u64]) -> StatusCounts {
    let active: HashSet<u64> = active.iter().copied().collect();
    rows.iter()
        .filter(|(user_id, _)| active.contains(user_id))
        .map(|&(_, status)| status)
        .collect()
}

/// First and last day of a `YYYY-MM` month.
pub fn month_bounds(raw: &str) -> Result<(NaiveDate, NaiveDate), RuleViolation> {
    let first = NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d")
        .map_err(|_| RuleViolation::InvalidMonth)?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or(RuleViolation::InvalidMonth)?;
    Ok((first, last))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use AttendanceStatus::*;

    fn rec(status: AttendanceStatus, hours: Option<f64>, od: bool) -> DayRecord {
        DayRecord {
            status,
            work_hours: hours,
            outdoor_duty: od,
        }
    }

    #[test]
    fn monthly_summary_aggregates() {
        let records = [
            rec(Present, Some(9.0), false),
            rec(Late, Some(8.0), false),
            rec(HalfDay, Some(4.0), true),
            rec(Absent, Some(0.5), false),
            rec(OnLeave, None, false),
        ];
        let summary = summarize_month(7, "2025-06", &records, 1);

        assert_eq!(summary.counts.present, 1);
        assert_eq!(summary.counts.late, 1);
        assert_eq!(summary.counts.half_day, 1);
        assert_eq!(summary.counts.absent, 1);
        assert_eq!(summary.counts.on_leave, 1);
        assert_eq!(summary.days_attended, 3);
        assert_eq!(summary.days_recorded, 5);
        assert_eq!(summary.total_work_hours, 21.5);
        assert_eq!(summary.average_work_hours, 5.38);
        assert_eq!(summary.outdoor_duty_days, 1);
        assert_eq!(summary.leave_days, 1);
    }

    #[test]
    fn empty_month() {
        let summary = summarize_month(1, "2025-02", &[], 0);
        assert_eq!(summary.average_work_hours, 0.0);
        assert_eq!(summary.counts, StatusCounts::default());
    }

    #[test]
    fn unmarked_keeps_order() {
        let marked: HashSet<u64> = [2, 4].into_iter().collect();
        assert_eq!(unmarked_users(&[1, 2, 3, 4, 5], &marked), vec![1, 3, 5]);
    }

    #[test]
    fn deactivated_users_drop_out_of_day_counts() {
        let rows = [
            (1, AttendanceStatus::Present),
            (2, AttendanceStatus::Late),
            (7, AttendanceStatus::Absent),
        ];
        let counts = active_counts(&rows, &[1, 2, 3]);
        assert_eq!(counts.present, 1);
        assert_eq!(counts.late, 1);
        assert_eq!(counts.absent, 0);
    }

    #[test]
    fn month_parsing() {
        let (first, last) = month_bounds("2024-02").unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let (_, december_end) = month_bounds("2025-12").unwrap();
        assert_eq!(december_end, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());

        assert_eq!(month_bounds("2025-13"), Err(RuleViolation::InvalidMonth));
        assert_eq!(month_bounds("june"), Err(RuleViolation::InvalidMonth));
    }
}
