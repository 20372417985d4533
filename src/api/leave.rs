use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use strum::IntoEnumIterator;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use super::{clean_text, not_pending};
use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::leave::{Leave, LeaveType, leave_columns};
use crate::model::request_status::{RequestStatus, ReviewNote};
use crate::models::{Page, pagination};
use crate::rules::RuleViolation;
use crate::rules::clock::local_today;
use crate::rules::leave::{LeaveBalance, balance, check_quota, validate_leave_range};
use crate::utils::db_utils::{FilterValue, Filters, fetch_page, work_calendar};
use crate::utils::settings_cache::SettingsCache;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyLeave {
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-05")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-06")]
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    /// Ledger entry to spend, required for `comp_off`
    pub comp_off_id: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LeaveFilter {
    pub user_id: Option<u64>,
    #[param(value_type = Option<String>, example = "pending")]
    pub status: Option<RequestStatus>,
    #[param(value_type = Option<String>, example = "casual")]
    pub leave_type: Option<LeaveType>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BalanceQuery {
    pub user_id: Option<u64>,
    /// Calendar year, defaults to the current one
    pub year: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    pub user_id: u64,
    pub year: i32,
    pub balances: Vec<LeaveBalance>,
    /// Unused comp-off ledger entries
    pub comp_off_available: i64,
}

async fn fetch_leave<'e, E>(executor: E, id: u64) -> AppResult<Leave>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    sqlx::query_as::<_, Leave>(concat!("SELECT ", leave_columns!(), " FROM leaves WHERE id = ?"))
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found("Leave request not found"))
}

/// Approved plus pending days of one type in the year of `start`.
async fn committed_days(
    pool: &MySqlPool,
    user_id: u64,
    leave_type: LeaveType,
    year: i32,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT CAST(COALESCE(SUM(days), 0) AS SIGNED)
        FROM leaves
        WHERE user_id = ? AND leave_type = ? AND YEAR(start_date) = ?
          AND status IN ('pending', 'approved')
        "#,
    )
    .bind(user_id)
    .bind(leave_type.as_ref())
    .bind(year)
    .fetch_one(pool)
    .await
}

async fn ensure_comp_off_available(
    pool: &MySqlPool,
    user_id: u64,
    comp_off_id: u64,
) -> AppResult<()> {
    let (unused, requested) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT
            EXISTS(SELECT 1 FROM comp_offs WHERE id = ? AND user_id = ? AND used = 0),
            EXISTS(SELECT 1 FROM leaves WHERE comp_off_id = ? AND status = 'pending')
        "#,
    )
    .bind(comp_off_id)
    .bind(user_id)
    .bind(comp_off_id)
    .fetch_one(pool)
    .await?;

    if unused == 0 {
        return Err(AppError::bad_request("Comp-off entry not found or already used"));
    }
    if requested != 0 {
        return Err(AppError::conflict("Comp-off entry is already requested by a pending leave"));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/leaves",
    request_body = ApplyLeave,
    responses(
        (status = 201, description = "Leave request submitted", body = Leave),
        (status = 400, description = "Invalid range, no working days or insufficient balance"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Overlaps an existing leave")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
#[instrument(name = "apply_leave", skip(pool, settings, body), fields(user_id = auth.user_id))]
pub async fn apply_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    settings: web::Data<SettingsCache>,
    body: web::Json<ApplyLeave>,
) -> AppResult<HttpResponse> {
    let pool = pool.get_ref();
    let body = body.into_inner();
    let settings = settings.get(pool).await?;

    let calendar = work_calendar(pool, &settings, body.start_date, body.end_date).await?;
    let days = validate_leave_range(&calendar, body.leave_type, body.start_date, body.end_date)?;

    let overlapping = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM leaves
            WHERE user_id = ? AND status IN ('pending', 'approved')
              AND start_date <= ? AND end_date >= ?
        )
        "#,
    )
    .bind(auth.user_id)
    .bind(body.end_date)
    .bind(body.start_date)
    .fetch_one(pool)
    .await?;
    if overlapping != 0 {
        return Err(RuleViolation::Overlap("leave".into()).into());
    }

    let committed =
        committed_days(pool, auth.user_id, body.leave_type, body.start_date.year()).await?;
    check_quota(
        body.leave_type,
        settings.quota(body.leave_type),
        committed as i32,
        days,
    )?;

    let comp_off_id = if body.leave_type == LeaveType::CompOff {
        let id = body
            .comp_off_id
            .ok_or_else(|| AppError::bad_request("comp_off_id is required for comp-off leave"))?;
        ensure_comp_off_available(pool, auth.user_id, id).await?;
        Some(id)
    } else {
        None
    };

    let result = sqlx::query(
        r#"
        INSERT INTO leaves
            (user_id, leave_type, start_date, end_date, days, reason, status, comp_off_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, UTC_TIMESTAMP())
        "#,
    )
    .bind(auth.user_id)
    .bind(body.leave_type.as_ref())
    .bind(body.start_date)
    .bind(body.end_date)
    .bind(days)
    .bind(clean_text(body.reason))
    .bind(comp_off_id)
    .execute(pool)
    .await?;

    info!(leave_type = %body.leave_type, days, "Leave requested");

    let leave = fetch_leave(pool, result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(leave))
}

#[utoipa::path(
    get,
    path = "/api/leaves",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave requests", body = LeavePage),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Employees cannot list other users")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list_leaves(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let (page, per_page, offset) = pagination(query.page, query.per_page);

    let mut filters = Filters::new();
    filters
        .push_opt("user_id = ?", auth.scope_user(query.user_id)?, FilterValue::U64)
        .push_opt("status = ?", query.status, |s| FilterValue::Str(s.to_string()))
        .push_opt("leave_type = ?", query.leave_type, |t| FilterValue::Str(t.to_string()));

    let (data, total) = fetch_page::<Leave>(
        pool.get_ref(),
        leave_columns!(),
        "leaves",
        &filters,
        "created_at DESC, id DESC",
        per_page,
        offset,
    )
    .await?;

    Ok(HttpResponse::Ok().json(Page {
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/leaves/{id}",
    params(("id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Leave request", body = Leave),
        (status = 403, description = "Not your leave request"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let leave = fetch_leave(pool.get_ref(), path.into_inner()).await?;
    auth.ensure_can_access(leave.user_id)?;
    Ok(HttpResponse::Ok().json(leave))
}

#[utoipa::path(
    put,
    path = "/api/leaves/{id}/approve",
    params(("id" = u64, Path, description = "Leave request id")),
    request_body = ReviewNote,
    responses(
        (status = 200, description = "Leave approved", body = Leave),
        (status = 403, description = "Admin/Subadmin only"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Not pending, or comp-off entry already used")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
#[instrument(name = "approve_leave", skip(pool, settings, body), fields(by = auth.user_id))]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    settings: web::Data<SettingsCache>,
    path: web::Path<u64>,
    body: Option<web::Json<ReviewNote>>,
) -> AppResult<HttpResponse> {
    auth.require_manager()?;

    let pool = pool.get_ref();
    let leave_id = path.into_inner();
    let note = body.and_then(|b| clean_text(b.into_inner().note));

    let mut tx = pool.begin().await?;

    let leave = sqlx::query_as::<_, Leave>(concat!(
        "SELECT ",
        leave_columns!(),
        " FROM leaves WHERE id = ? FOR UPDATE"
    ))
    .bind(leave_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Leave request not found"))?;

    if leave.status != RequestStatus::Pending {
        return Err(AppError::conflict("Leave request is not pending"));
    }

    if leave.leave_type == LeaveType::CompOff {
        let comp_off_id = leave
            .comp_off_id
            .ok_or_else(|| AppError::bad_request("Comp-off leave has no ledger entry"))?;

        let consumed = sqlx::query(
            r#"
            UPDATE comp_offs
            SET used = 1, leave_id = ?
            WHERE id = ? AND user_id = ? AND used = 0
            "#,
        )
        .bind(leave.id)
        .bind(comp_off_id)
        .bind(leave.user_id)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() == 0 {
            return Err(AppError::conflict("Comp-off entry already used"));
        }
    }

    sqlx::query(
        r#"
        UPDATE leaves
        SET status = 'approved', reviewed_by = ?, reviewed_at = UTC_TIMESTAMP(), review_note = ?
        WHERE id = ?
        "#,
    )
    .bind(auth.user_id)
    .bind(&note)
    .bind(leave.id)
    .execute(&mut *tx)
    .await?;

    let settings = settings.get(pool).await?;
    let calendar = work_calendar(pool, &settings, leave.start_date, leave.end_date).await?;
    let days = calendar.working_days(leave.start_date, leave.end_date);

    for day in &days {
        sqlx::query(
            r#"
            INSERT IGNORE INTO attendance (user_id, date, status, auto_checked_out)
            VALUES (?, ?, 'on_leave', 0)
            "#,
        )
        .bind(leave.user_id)
        .bind(*day)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(
        leave_id,
        user_id = leave.user_id,
        days = days.len(),
        "Leave approved"
    );

    Ok(HttpResponse::Ok().json(fetch_leave(pool, leave_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/leaves/{id}/reject",
    params(("id" = u64, Path, description = "Leave request id")),
    request_body = ReviewNote,
    responses(
        (status = 200, description = "Leave rejected", body = Leave),
        (status = 403, description = "Admin/Subadmin only"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request is not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: Option<web::Json<ReviewNote>>,
) -> AppResult<HttpResponse> {
    auth.require_manager()?;

    let pool = pool.get_ref();
    let leave_id = path.into_inner();
    let note = body.and_then(|b| clean_text(b.into_inner().note));

    let result = sqlx::query(
        r#"
        UPDATE leaves
        SET status = 'rejected', reviewed_by = ?, reviewed_at = UTC_TIMESTAMP(), review_note = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(auth.user_id)
    .bind(&note)
    .bind(leave_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(not_pending(pool, "leaves", leave_id, "Leave request").await);
    }

    info!(leave_id, by = auth.user_id, "Leave rejected");
    Ok(HttpResponse::Ok().json(fetch_leave(pool, leave_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/leaves/{id}/cancel",
    params(("id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Leave cancelled", body = Leave),
        (status = 403, description = "Not your leave request"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request is not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let pool = pool.get_ref();
    let leave = fetch_leave(pool, path.into_inner()).await?;

    if leave.user_id != auth.user_id {
        return Err(AppError::forbidden("Only the requester can cancel a leave"));
    }

    let result = sqlx::query(
        "UPDATE leaves SET status = 'cancelled' WHERE id = ? AND status = 'pending'",
    )
    .bind(leave.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::conflict("Leave request is not pending"));
    }

    info!(leave_id = leave.id, user_id = auth.user_id, "Leave cancelled");
    Ok(HttpResponse::Ok().json(fetch_leave(pool, leave.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/leaves/balance",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Per-type balance for the year", body = BalanceResponse),
        (status = 403, description = "Employees cannot view other users")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    settings: web::Data<SettingsCache>,
    query: web::Query<BalanceQuery>,
) -> AppResult<HttpResponse> {
    let pool = pool.get_ref();
    let user_id = query.user_id.unwrap_or(auth.user_id);
    auth.ensure_can_access(user_id)?;

    let settings = settings.get(pool).await?;
    let year = query
        .year
        .unwrap_or_else(|| local_today(Utc::now(), settings.offset()).year());

    let rows = sqlx::query_as::<_, (String, String, i64)>(
        r#"
        SELECT leave_type, status, CAST(SUM(days) AS SIGNED)
        FROM leaves
        WHERE user_id = ? AND YEAR(start_date) = ? AND status IN ('pending', 'approved')
        GROUP BY leave_type, status
        "#,
    )
    .bind(user_id)
    .bind(year)
    .fetch_all(pool)
    .await?;

    let days_for = |leave_type: LeaveType, status: RequestStatus| -> i32 {
        rows.iter()
            .filter(|(t, s, _)| t == leave_type.as_ref() && s == status.as_ref())
            .map(|(_, _, d)| *d as i32)
            .sum()
    };

    let balances = LeaveType::iter()
        .map(|t| {
            balance(
                t,
                settings.quota(t),
                days_for(t, RequestStatus::Approved),
                days_for(t, RequestStatus::Pending),
            )
        })
        .collect();

    let comp_off_available = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM comp_offs WHERE user_id = ? AND used = 0",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(HttpResponse::Ok().json(BalanceResponse {
        user_id,
        year,
        balances,
        comp_off_available,
    }))
}
