use std::collections::HashSet;

use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::AppResult;
use crate::model::attendance::AttendanceStatus;
use crate::rules::clock::local_today;
use crate::rules::report::{
    DayRecord, StatusCounts, active_counts, month_bounds, summarize_month, unmarked_users,
};
use crate::utils::db_utils::work_calendar;
use crate::utils::settings_cache::SettingsCache;

#[derive(Debug, Deserialize, IntoParams)]
pub struct DailyQuery {
    /// Defaults to today in office time
    #[param(value_type = Option<String>, example = "2025-06-02")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MonthlyQuery {
    /// Defaults to the caller
    pub user_id: Option<u64>,
    /// `YYYY-MM`, defaults to the current month
    #[param(example = "2025-06")]
    pub month: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct EmployeeRef {
    pub id: u64,
    pub username: String,
    pub full_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DailyReport {
    #[schema(example = "2025-06-02")]
    pub date: NaiveDate,
    pub counts: StatusCounts,
    pub active_employees: u32,
    /// Active employees without any record for the day
    pub not_marked: Vec<EmployeeRef>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Dashboard {
    #[schema(example = "2025-06-02")]
    pub date: NaiveDate,
    pub counts: StatusCounts,
    pub active_employees: u32,
    pub not_marked: u32,
    pub pending_leaves: i64,
    pub pending_outdoor_duties: i64,
}

#[derive(sqlx::FromRow)]
struct StatusRow {
    user_id: u64,
    #[sqlx(try_from = "String")]
    status: AttendanceStatus,
}

#[derive(sqlx::FromRow)]
struct DayRow {
    #[sqlx(try_from = "String")]
    status: AttendanceStatus,
    work_hours: Option<f64>,
    outdoor_duty_id: Option<u64>,
}

impl From<DayRow> for DayRecord {
    fn from(row: DayRow) -> Self {
        DayRecord {
            status: row.status,
            work_hours: row.work_hours,
            outdoor_duty: row.outdoor_duty_id.is_some(),
        }
    }
}

struct DaySnapshot {
    counts: StatusCounts,
    active: Vec<EmployeeRef>,
    not_marked: Vec<EmployeeRef>,
}

async fn day_snapshot(pool: &MySqlPool, date: NaiveDate) -> Result<DaySnapshot, sqlx::Error> {
    let rows = sqlx::query_as::<_, StatusRow>(
        r#"
        SELECT a.user_id, a.status
        FROM attendance a
        JOIN users u ON u.id = a.user_id
        WHERE a.date = ? AND u.is_active = 1
        "#,
    )
    .bind(date)
    .fetch_all(pool)
    .await?;

    let active = sqlx::query_as::<_, EmployeeRef>(
        "SELECT id, username, full_name FROM users WHERE is_active = 1 ORDER BY full_name, id",
    )
    .fetch_all(pool)
    .await?;

    let active_ids: Vec<u64> = active.iter().map(|u| u.id).collect();
    let statuses: Vec<(u64, AttendanceStatus)> =
        rows.iter().map(|r| (r.user_id, r.status)).collect();
    let counts = active_counts(&statuses, &active_ids);
    let marked: HashSet<u64> = rows.iter().map(|r| r.user_id).collect();

    let missing: HashSet<u64> = unmarked_users(&active_ids, &marked).into_iter().collect();
    let not_marked = active
        .iter()
        .filter(|u| missing.contains(&u.id))
        .cloned()
        .collect();

    Ok(DaySnapshot {
        counts,
        active,
        not_marked,
    })
}

#[utoipa::path(
    get,
    path = "/api/reports/daily",
    params(DailyQuery),
    responses(
        (status = 200, description = "Status counts for one day", body = DailyReport),
        (status = 403, description = "Admin/Subadmin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn daily_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SettingsCache>,
    query: web::Query<DailyQuery>,
) -> AppResult<HttpResponse> {
    auth.require_manager()?;

    let pool = pool.get_ref();
    let date = match query.date {
        Some(date) => date,
        None => local_today(Utc::now(), cache.get(pool).await?.offset()),
    };

    let snapshot = day_snapshot(pool, date).await?;

    Ok(HttpResponse::Ok().json(DailyReport {
        date,
        counts: snapshot.counts,
        active_employees: snapshot.active.len() as u32,
        not_marked: snapshot.not_marked,
    }))
}

#[utoipa::path(
    get,
    path = "/api/reports/monthly",
    params(MonthlyQuery),
    responses(
        (status = 200, description = "Monthly attendance summary", body = MonthlySummary),
        (status = 400, description = "Month is not YYYY-MM"),
        (status = 403, description = "Not allowed to view other users")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn monthly_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SettingsCache>,
    query: web::Query<MonthlyQuery>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let user_id = query.user_id.unwrap_or(auth.user_id);
    auth.ensure_can_access(user_id)?;

    let pool = pool.get_ref();
    let settings = cache.get(pool).await?;

    let month = match query.month {
        Some(month) => month.trim().to_string(),
        None => local_today(Utc::now(), settings.offset())
            .format("%Y-%m")
            .to_string(),
    };
    let (first, last) = month_bounds(&month)?;

    let records: Vec<DayRecord> = sqlx::query_as::<_, DayRow>(
        r#"
        SELECT status, work_hours, outdoor_duty_id
        FROM attendance
        WHERE user_id = ? AND date BETWEEN ? AND ?
        ORDER BY date
        "#,
    )
    .bind(user_id)
    .bind(first)
    .bind(last)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(DayRecord::from)
    .collect();

    let leaves = sqlx::query_as::<_, (NaiveDate, NaiveDate)>(
        r#"
        SELECT start_date, end_date
        FROM leaves
        WHERE user_id = ? AND status = 'approved' AND start_date <= ? AND end_date >= ?
        "#,
    )
    .bind(user_id)
    .bind(last)
    .bind(first)
    .fetch_all(pool)
    .await?;

    let calendar = work_calendar(pool, &settings, first, last).await?;
    let leave_days: i32 = leaves
        .into_iter()
        .map(|(start, end)| calendar.count_working_days(start.max(first), end.min(last)))
        .sum();

    Ok(HttpResponse::Ok().json(summarize_month(user_id, &month, &records, leave_days)))
}

#[utoipa::path(
    get,
    path = "/api/reports/dashboard",
    responses(
        (status = 200, description = "Today's overview and pending approvals", body = Dashboard),
        (status = 403, description = "Admin/Subadmin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SettingsCache>,
) -> AppResult<HttpResponse> {
    auth.require_manager()?;

    let pool = pool.get_ref();
    let today = local_today(Utc::now(), cache.get(pool).await?.offset());
    let snapshot = day_snapshot(pool, today).await?;

    let pending_leaves =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM leaves WHERE status = 'pending'")
            .fetch_one(pool)
            .await?;
    let pending_outdoor_duties = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM outdoor_duties WHERE status = 'pending'",
    )
    .fetch_one(pool)
    .await?;

    Ok(HttpResponse::Ok().json(Dashboard {
        date: today,
        counts: snapshot.counts,
        active_employees: snapshot.active.len() as u32,
        not_marked: snapshot.not_marked.len() as u32,
        pending_leaves,
        pending_outdoor_duties,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_rows_flag_outdoor_duty() {
        let record = DayRecord::from(DayRow {
            status: AttendanceStatus::Present,
            work_hours: Some(8.0),
            outdoor_duty_id: Some(4),
        });
        assert!(record.outdoor_duty);

        let record = DayRecord::from(DayRow {
            status: AttendanceStatus::OnLeave,
            work_hours: None,
            outdoor_duty_id: None,
        });
        assert!(!record.outdoor_duty);
    }
}
