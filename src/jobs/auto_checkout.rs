//! Closes attendance days left open by employees whose approved outdoor duty
//! ran past office hours.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

use crate::model::attendance::AttendanceStatus;
use crate::model::comp_off::CompOffSource;
use crate::model::settings::Settings;
use crate::rules::clock::{local_today, to_local};
use crate::rules::status::{AttendancePolicy, classify_arrival};
use crate::rules::sweep::{DutyWindow, SweepCandidate, plan_auto_checkouts};
use crate::utils::db_utils::{credit_comp_off, work_calendar};
use crate::utils::settings_cache::SettingsCache;

#[derive(Debug, sqlx::FromRow)]
struct OpenDayRow {
    attendance_id: u64,
    user_id: u64,
    date: NaiveDate,
    check_in: DateTime<Utc>,
    duty_id: u64,
    start_time: NaiveTime,
    end_time: NaiveTime,
}

/// Rows arrive ordered by attendance id, one per approved duty.
fn group_candidates(
    rows: Vec<OpenDayRow>,
    policy: &AttendancePolicy,
    settings: &Settings,
) -> Vec<SweepCandidate> {
    let offset = settings.offset();
    let mut candidates: Vec<SweepCandidate> = Vec::new();

    for row in rows {
        let duty = DutyWindow {
            id: row.duty_id,
            start: row.start_time,
            end: row.end_time,
        };
        match candidates.last_mut() {
            Some(c) if c.attendance_id == row.attendance_id => c.duties.push(duty),
            _ => candidates.push(SweepCandidate {
                attendance_id: row.attendance_id,
                user_id: row.user_id,
                date: row.date,
                check_in: row.check_in,
                check_in_status: AttendanceStatus::Present,
                duties: vec![duty],
            }),
        }
    }

    for c in &mut candidates {
        let first_start = c.duties.iter().map(|d| d.start).min();
        c.check_in_status =
            classify_arrival(policy, to_local(c.check_in, offset).time(), first_start);
    }
    candidates
}

/// Sweeps one office-local date and returns how many days were closed.
#[instrument(name = "auto_checkout", skip(pool, settings, now))]
pub async fn run_sweep(
    pool: &MySqlPool,
    settings: &Settings,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<usize, sqlx::Error> {
    let rows = sqlx::query_as::<_, OpenDayRow>(
        r#"
        SELECT a.id AS attendance_id, a.user_id, a.date, a.check_in,
               od.id AS duty_id, od.start_time, od.end_time
        FROM attendance a
        JOIN outdoor_duties od
          ON od.user_id = a.user_id AND od.date = a.date AND od.status = 'approved'
        WHERE a.date = ?
          AND a.check_in IS NOT NULL
          AND a.check_out IS NULL
        ORDER BY a.id, od.start_time
        "#,
    )
    .bind(date)
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        return Ok(0);
    }

    let policy = settings.policy();
    let candidates = group_candidates(rows, &policy, settings);
    let plan = plan_auto_checkouts(&candidates, &policy, settings.offset(), now);
    let off_day = work_calendar(pool, settings, date, date)
        .await?
        .is_off_day(date);

    let mut closed = 0;
    for planned in plan {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET check_out = ?,
                status = ?,
                work_hours = ?,
                auto_checked_out = 1,
                outdoor_duty_id = COALESCE(outdoor_duty_id, ?)
            WHERE id = ?
              AND check_in IS NOT NULL
              AND check_out IS NULL
            "#,
        )
        .bind(planned.check_out)
        .bind(planned.status.as_ref())
        .bind(planned.work_hours)
        .bind(planned.duty_id)
        .bind(planned.attendance_id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            continue;
        }
        closed += 1;
        info!(
            user_id = planned.user_id,
            attendance_id = planned.attendance_id,
            status = %planned.status,
            "Auto checked out"
        );

        if off_day && planned.status != AttendanceStatus::Absent {
            credit_comp_off(pool, planned.user_id, date, CompOffSource::OffDayAttendance).await?;
        }
    }

    Ok(closed)
}

async fn sweep_recent(pool: &MySqlPool, cache: &SettingsCache) -> Result<usize, sqlx::Error> {
    let settings = cache.get(pool).await?;
    let now = Utc::now();
    let today = local_today(now, settings.offset());

    let mut closed = 0;
    for date in [today.pred_opt(), Some(today)].into_iter().flatten() {
        closed += run_sweep(pool, &settings, date, now).await?;
    }
    Ok(closed)
}

/// Runs the sweep for yesterday and today on a fixed interval.
pub fn spawn_scheduler(pool: MySqlPool, cache: SettingsCache, every: Duration) {
    actix_web::rt::spawn(async move {
        let mut ticker = actix_web::rt::time::interval(every);
        loop {
            ticker.tick().await;
            match sweep_recent(&pool, &cache).await {
                Ok(0) => debug!("Auto-checkout sweep found nothing to close"),
                Ok(closed) => info!(closed, "Auto-checkout sweep finished"),
                Err(e) => error!(error = %e, "Auto-checkout sweep failed"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::clock::at_local;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn row(
        attendance_id: u64,
        duty_id: u64,
        check_in: NaiveTime,
        start: NaiveTime,
        end: NaiveTime,
    ) -> OpenDayRow {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        OpenDayRow {
            attendance_id,
            user_id: attendance_id + 100,
            date,
            check_in: at_local(date, check_in, Settings::default().offset()),
            duty_id,
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn duties_are_grouped_per_attendance_day() {
        let settings = Settings::default();
        let rows = vec![
            row(1, 10, t(9, 0), t(10, 0), t(12, 0)),
            row(1, 11, t(9, 0), t(15, 0), t(18, 30)),
            row(2, 12, t(10, 0), t(14, 0), t(19, 0)),
        ];

        let candidates = group_candidates(rows, &settings.policy(), &settings);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].duties.len(), 2);
        assert_eq!(candidates[1].user_id, 102);
        assert_eq!(candidates[1].check_in_status, AttendanceStatus::Late);
    }

    #[test]
    fn field_start_before_check_in_counts_as_arrival() {
        let settings = Settings::default();
        let rows = vec![row(3, 13, t(11, 30), t(8, 45), t(18, 0))];

        let candidates = group_candidates(rows, &settings.policy(), &settings);
        assert_eq!(candidates[0].check_in_status, AttendanceStatus::Present);
    }
}
