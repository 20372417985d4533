use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use super::{clean_text, not_pending, require_text};
use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::attendance::{Attendance, attendance_columns};
use crate::model::outdoor_duty::{OutdoorDuty, outdoor_duty_columns};
use crate::model::request_status::{RequestStatus, ReviewNote};
use crate::models::{Page, pagination};
use crate::rules::RuleViolation;
use crate::rules::clock::to_local;
use crate::rules::duty::{
    DutyApproval, ExistingDay, ensure_no_overlap, plan_duty_approval, validate_window,
};
use crate::rules::status::Span;
use crate::utils::db_utils::{FilterValue, Filters, fetch_page, on_approved_leave};
use crate::utils::settings_cache::SettingsCache;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestOutdoorDuty {
    #[schema(example = "2025-06-02")]
    pub date: NaiveDate,
    #[schema(example = "14:00:00", value_type = String)]
    pub start_time: NaiveTime,
    #[schema(example = "18:30:00", value_type = String)]
    pub end_time: NaiveTime,
    #[schema(example = "Client visit")]
    pub purpose: String,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OutdoorDutyFilter {
    pub user_id: Option<u64>,
    #[param(value_type = Option<String>, example = "approved")]
    pub status: Option<RequestStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

async fn fetch_duty<'e, E>(executor: E, id: u64) -> AppResult<OutdoorDuty>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    sqlx::query_as::<_, OutdoorDuty>(concat!(
        "SELECT ",
        outdoor_duty_columns!(),
        " FROM outdoor_duties WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AppError::not_found("Outdoor duty not found"))
}

#[utoipa::path(
    post,
    path = "/api/outdoor-duties",
    request_body = RequestOutdoorDuty,
    responses(
        (status = 201, description = "Outdoor duty requested", body = OutdoorDuty),
        (status = 400, description = "Invalid time window or missing purpose"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Overlaps another outdoor duty or an approved leave")
    ),
    security(("bearer_auth" = [])),
    tag = "Outdoor Duty"
)]
#[instrument(name = "request_outdoor_duty", skip(pool, body), fields(user_id = auth.user_id))]
pub async fn request_duty(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<RequestOutdoorDuty>,
) -> AppResult<HttpResponse> {
    let pool = pool.get_ref();
    let body = body.into_inner();

    validate_window(body.start_time, body.end_time)?;
    let purpose = require_text(&body.purpose, "purpose")?;

    if on_approved_leave(pool, auth.user_id, body.date).await? {
        return Err(RuleViolation::Overlap("leave".into()).into());
    }

    let existing = sqlx::query_as::<_, (NaiveTime, NaiveTime)>(
        r#"
        SELECT start_time, end_time
        FROM outdoor_duties
        WHERE user_id = ? AND date = ? AND status IN ('pending', 'approved')
        "#,
    )
    .bind(auth.user_id)
    .bind(body.date)
    .fetch_all(pool)
    .await?;
    ensure_no_overlap((body.start_time, body.end_time), &existing)?;

    let result = sqlx::query(
        r#"
        INSERT INTO outdoor_duties
            (user_id, date, start_time, end_time, purpose, location, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 'pending', UTC_TIMESTAMP())
        "#,
    )
    .bind(auth.user_id)
    .bind(body.date)
    .bind(body.start_time)
    .bind(body.end_time)
    .bind(purpose)
    .bind(clean_text(body.location))
    .execute(pool)
    .await?;

    info!(date = %body.date, "Outdoor duty requested");

    let duty = fetch_duty(pool, result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(duty))
}

#[utoipa::path(
    get,
    path = "/api/outdoor-duties",
    params(OutdoorDutyFilter),
    responses(
        (status = 200, description = "Paginated outdoor duties", body = OutdoorDutyPage),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Employees cannot list other users")
    ),
    security(("bearer_auth" = [])),
    tag = "Outdoor Duty"
)]
pub async fn list_duties(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<OutdoorDutyFilter>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let (page, per_page, offset) = pagination(query.page, query.per_page);

    let mut filters = Filters::new();
    filters
        .push_opt("user_id = ?", auth.scope_user(query.user_id)?, FilterValue::U64)
        .push_opt("status = ?", query.status, |s| FilterValue::Str(s.to_string()))
        .push_opt("date >= ?", query.from, FilterValue::Date)
        .push_opt("date <= ?", query.to, FilterValue::Date);

    let (data, total) = fetch_page::<OutdoorDuty>(
        pool.get_ref(),
        outdoor_duty_columns!(),
        "outdoor_duties",
        &filters,
        "date DESC, start_time DESC",
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
    path = "/api/outdoor-duties/{id}",
    params(("id" = u64, Path, description = "Outdoor duty id")),
    responses(
        (status = 200, description = "Outdoor duty", body = OutdoorDuty),
        (status = 403, description = "Not your outdoor duty"),
        (status = 404, description = "Outdoor duty not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Outdoor Duty"
)]
pub async fn get_duty(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let duty = fetch_duty(pool.get_ref(), path.into_inner()).await?;
    auth.ensure_can_access(duty.user_id)?;
    Ok(HttpResponse::Ok().json(duty))
}

/// Approval runs in one transaction: the duty row and the attendance row of
/// that day are locked, so concurrent approvals serialize.
#[utoipa::path(
    put,
    path = "/api/outdoor-duties/{id}/approve",
    params(("id" = u64, Path, description = "Outdoor duty id")),
    request_body = ReviewNote,
    responses(
        (status = 200, description = "Outdoor duty approved, attendance updated", body = OutdoorDuty),
        (status = 403, description = "Admin/Subadmin only"),
        (status = 404, description = "Outdoor duty not found"),
        (status = 409, description = "Not pending, or overlaps an approved duty or leave")
    ),
    security(("bearer_auth" = [])),
    tag = "Outdoor Duty"
)]
#[instrument(name = "approve_outdoor_duty", skip(pool, settings, body), fields(by = auth.user_id))]
pub async fn approve_duty(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    settings: web::Data<SettingsCache>,
    path: web::Path<u64>,
    body: Option<web::Json<ReviewNote>>,
) -> AppResult<HttpResponse> {
    auth.require_manager()?;

    let pool = pool.get_ref();
    let duty_id = path.into_inner();
    let note = body.and_then(|b| clean_text(b.into_inner().note));
    let settings = settings.get(pool).await?;
    let policy = settings.policy();
    let offset = settings.offset();

    let mut tx = pool.begin().await?;

    let duty = sqlx::query_as::<_, OutdoorDuty>(concat!(
        "SELECT ",
        outdoor_duty_columns!(),
        " FROM outdoor_duties WHERE id = ? FOR UPDATE"
    ))
    .bind(duty_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Outdoor duty not found"))?;

    if duty.status != RequestStatus::Pending {
        return Err(AppError::conflict("Outdoor duty is not pending"));
    }
    if on_approved_leave(&mut *tx, duty.user_id, duty.date).await? {
        return Err(RuleViolation::Overlap("leave".into()).into());
    }

    let mut approved = sqlx::query_as::<_, (NaiveTime, NaiveTime)>(
        r#"
        SELECT start_time, end_time
        FROM outdoor_duties
        WHERE user_id = ? AND date = ? AND status = 'approved' AND id <> ?
        FOR UPDATE
        "#,
    )
    .bind(duty.user_id)
    .bind(duty.date)
    .bind(duty.id)
    .fetch_all(&mut *tx)
    .await?;
    ensure_no_overlap(duty.window(), &approved)?;

    sqlx::query(
        r#"
        UPDATE outdoor_duties
        SET status = 'approved', reviewed_by = ?, reviewed_at = UTC_TIMESTAMP(), review_note = ?
        WHERE id = ?
        "#,
    )
    .bind(auth.user_id)
    .bind(&note)
    .bind(duty.id)
    .execute(&mut *tx)
    .await?;

    approved.push(duty.window());
    let spans: Vec<Span> = approved
        .iter()
        .map(|&(start, end)| Span::on(duty.date, start, end))
        .collect();

    let attendance = sqlx::query_as::<_, Attendance>(concat!(
        "SELECT ",
        attendance_columns!(),
        " FROM attendance WHERE user_id = ? AND date = ? FOR UPDATE"
    ))
    .bind(duty.user_id)
    .bind(duty.date)
    .fetch_optional(&mut *tx)
    .await?;

    let existing = attendance.as_ref().map(|record| ExistingDay {
        status: record.status,
        check_in: record.check_in.map(|at| to_local(at, offset)),
        check_out: record.check_out.map(|at| to_local(at, offset)),
    });

    let record_id = attendance.as_ref().map(|record| record.id);

    match plan_duty_approval(&policy, existing.as_ref(), &spans)? {
        DutyApproval::Insert(outcome) => {
            sqlx::query(
                r#"
                INSERT INTO attendance
                    (user_id, date, status, work_hours, outdoor_duty_id, auto_checked_out)
                VALUES (?, ?, ?, ?, ?, 0)
                "#,
            )
            .bind(duty.user_id)
            .bind(duty.date)
            .bind(outcome.status.as_ref())
            .bind(outcome.work_hours)
            .bind(duty.id)
            .execute(&mut *tx)
            .await?;
        }
        DutyApproval::LinkOnly => {
            sqlx::query(
                "UPDATE attendance SET outdoor_duty_id = COALESCE(outdoor_duty_id, ?) WHERE id = ?",
            )
            .bind(duty.id)
            .bind(record_id)
            .execute(&mut *tx)
            .await?;
        }
        DutyApproval::Recompute(outcome) => {
            sqlx::query(
                r#"
                UPDATE attendance
                SET status = ?, work_hours = ?, outdoor_duty_id = COALESCE(outdoor_duty_id, ?)
                WHERE id = ?
                "#,
            )
            .bind(outcome.status.as_ref())
            .bind(outcome.work_hours)
            .bind(duty.id)
            .bind(record_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    info!(duty_id, user_id = duty.user_id, date = %duty.date, "Outdoor duty approved");

    Ok(HttpResponse::Ok().json(fetch_duty(pool, duty_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/outdoor-duties/{id}/reject",
    params(("id" = u64, Path, description = "Outdoor duty id")),
    request_body = ReviewNote,
    responses(
        (status = 200, description = "Outdoor duty rejected", body = OutdoorDuty),
        (status = 403, description = "Admin/Subadmin only"),
        (status = 404, description = "Outdoor duty not found"),
        (status = 409, description = "Outdoor duty is not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Outdoor Duty"
)]
pub async fn reject_duty(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: Option<web::Json<ReviewNote>>,
) -> AppResult<HttpResponse> {
    auth.require_manager()?;

    let pool = pool.get_ref();
    let duty_id = path.into_inner();
    let note = body.and_then(|b| clean_text(b.into_inner().note));

    let result = sqlx::query(
        r#"
        UPDATE outdoor_duties
        SET status = 'rejected', reviewed_by = ?, reviewed_at = UTC_TIMESTAMP(), review_note = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(auth.user_id)
    .bind(&note)
    .bind(duty_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(not_pending(pool, "outdoor_duties", duty_id, "Outdoor duty").await);
    }

    info!(duty_id, by = auth.user_id, "Outdoor duty rejected");
    Ok(HttpResponse::Ok().json(fetch_duty(pool, duty_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/outdoor-duties/{id}/cancel",
    params(("id" = u64, Path, description = "Outdoor duty id")),
    responses(
        (status = 200, description = "Outdoor duty cancelled", body = OutdoorDuty),
        (status = 403, description = "Not your outdoor duty"),
        (status = 404, description = "Outdoor duty not found"),
        (status = 409, description = "Outdoor duty is not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Outdoor Duty"
)]
pub async fn cancel_duty(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let pool = pool.get_ref();
    let duty = fetch_duty(pool, path.into_inner()).await?;

    if duty.user_id != auth.user_id {
        return Err(AppError::forbidden("Only the requester can cancel an outdoor duty"));
    }

    let result = sqlx::query(
        "UPDATE outdoor_duties SET status = 'cancelled' WHERE id = ? AND status = 'pending'",
    )
    .bind(duty.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::conflict("Outdoor duty is not pending"));
    }

    info!(duty_id = duty.id, user_id = auth.user_id, "Outdoor duty cancelled");
    Ok(HttpResponse::Ok().json(fetch_duty(pool, duty.id).await?))
}
