use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult, is_unique_violation};
use crate::jobs::auto_checkout::run_sweep;
use crate::model::attendance::{Attendance, AttendanceStatus, attendance_columns};
use crate::model::comp_off::CompOffSource;
use crate::model::outdoor_duty::OutdoorDuty;
use crate::models::{Page, pagination};
use crate::rules::RuleViolation;
use crate::rules::clock::{local_today, to_local};
use crate::rules::geofence::{GeoPoint, validate_check_in_location};
use crate::rules::status::{
    CheckOutInput, Span, classify_arrival, classify_check_out, ensure_check_in_allowed,
};
use crate::utils::db_utils::{
    FilterValue, Filters, approved_duties_on, attendance_by_id, attendance_for_day,
    credit_comp_off, fetch_page, work_calendar,
};
use crate::utils::settings_cache::SettingsCache;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CheckInRequest {
    #[schema(example = 23.8103)]
    pub latitude: Option<f64>,
    #[schema(example = 90.4125)]
    pub longitude: Option<f64>,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CheckOutRequest {
    #[schema(example = 23.8103)]
    pub latitude: Option<f64>,
    #[schema(example = 90.4125)]
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AttendanceFilter {
    /// Managers only; employees always see their own records
    pub user_id: Option<u64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[param(value_type = Option<String>, example = "late")]
    pub status: Option<AttendanceStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAttendance {
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    /// Overrides the computed status
    pub status: Option<AttendanceStatus>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SweepQuery {
    /// Office-local date, defaults to today
    pub date: Option<NaiveDate>,
}

fn duty_spans(date: NaiveDate, duties: &[OutdoorDuty]) -> Vec<Span> {
    duties
        .iter()
        .map(|d| Span::on(date, d.start_time, d.end_time))
        .collect()
}

async fn reload(pool: &MySqlPool, id: u64) -> AppResult<Attendance> {
    attendance_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Attendance record not found"))
}

#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Checked in", body = Attendance),
        (status = 400, description = "Location missing or invalid"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Outside the office geofence", body = Object, example = json!({
            "message": "You are outside the office geofence",
            "distance_m": 412.0,
            "radius_m": 100.0
        })),
        (status = 409, description = "Already checked in today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "check_in", skip(pool, settings, body), fields(user_id = auth.user_id))]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    settings: web::Data<SettingsCache>,
    body: web::Json<CheckInRequest>,
) -> AppResult<HttpResponse> {
    let pool = pool.get_ref();
    let settings = settings.get(pool).await?;
    let offset = settings.offset();
    let now = Utc::now();
    let local = to_local(now, offset);
    let today = local.date();
    let body = body.into_inner();

    let existing = attendance_for_day(pool, auth.user_id, today).await?;
    if let Some(row) = &existing {
        ensure_check_in_allowed(row.status, row.check_in.is_some())?;
    }

    let location = GeoPoint::from_parts(body.latitude, body.longitude)?;
    let duties = approved_duties_on(pool, auth.user_id, today).await?;
    let distance_m =
        validate_check_in_location(&settings.geofence(), location, !duties.is_empty())?;

    let first_duty = duties.first();
    let status = classify_arrival(
        &settings.policy(),
        local.time(),
        first_duty.map(|d| d.start_time),
    );

    match existing {
        // Row created by an outdoor duty approval
        Some(existing) => {
            let result = sqlx::query(
                r#"
                UPDATE attendance
                SET check_in = ?, check_in_lat = ?, check_in_lng = ?, check_in_distance_m = ?,
                    status = ?, outdoor_duty_id = COALESCE(outdoor_duty_id, ?),
                    note = COALESCE(?, note)
                WHERE id = ? AND check_in IS NULL AND status <> 'on_leave'
                "#,
            )
            .bind(now)
            .bind(location.map(|p| p.latitude))
            .bind(location.map(|p| p.longitude))
            .bind(distance_m)
            .bind(status.as_ref())
            .bind(first_duty.map(|d| d.id))
            .bind(&body.note)
            .bind(existing.id)
            .execute(pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(RuleViolation::AlreadyCheckedIn.into());
            }
        }
        None => {
            sqlx::query(
                r#"
                INSERT INTO attendance
                    (user_id, date, check_in, check_in_lat, check_in_lng, check_in_distance_m,
                     status, outdoor_duty_id, auto_checked_out, note)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
                "#,
            )
            .bind(auth.user_id)
            .bind(today)
            .bind(now)
            .bind(location.map(|p| p.latitude))
            .bind(location.map(|p| p.longitude))
            .bind(distance_m)
            .bind(status.as_ref())
            .bind(first_duty.map(|d| d.id))
            .bind(&body.note)
            .execute(pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::from(RuleViolation::AlreadyCheckedIn)
                } else {
                    AppError::from(e)
                }
            })?;
        }
    }

    info!(%status, ?distance_m, outdoor_duty = first_duty.is_some(), "Checked in");

    let record = attendance_for_day(pool, auth.user_id, today)
        .await?
        .ok_or(AppError::Internal)?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body = CheckOutRequest,
    responses(
        (status = 200, description = "Checked out, status finalized", body = Attendance),
        (status = 400, description = "No active check-in found for today"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Already checked out today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "check_out", skip(pool, settings, body), fields(user_id = auth.user_id))]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    settings: web::Data<SettingsCache>,
    body: web::Json<CheckOutRequest>,
) -> AppResult<HttpResponse> {
    let pool = pool.get_ref();
    let settings = settings.get(pool).await?;
    let offset = settings.offset();
    let now = Utc::now();
    let today = local_today(now, offset);

    let record = attendance_for_day(pool, auth.user_id, today).await?;
    let Some((record, check_in)) = record.and_then(|r| r.check_in.map(|at| (r, at))) else {
        return Err(AppError::bad_request("No active check-in found for today"));
    };
    if record.check_out.is_some() {
        return Err(RuleViolation::AlreadyCheckedOut.into());
    }

    let location = GeoPoint::from_parts(body.latitude, body.longitude)?;
    let duties = approved_duties_on(pool, auth.user_id, today).await?;
    let policy = settings.policy();
    let local_check_in = to_local(check_in, offset);

    let outcome = classify_check_out(
        &policy,
        &CheckOutInput {
            check_in: local_check_in,
            check_out: to_local(now, offset),
            check_in_status: classify_arrival(
                &policy,
                local_check_in.time(),
                duties.first().map(|d| d.start_time),
            ),
            outdoor_duties: duty_spans(today, &duties),
        },
    )?;

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = ?, check_out_lat = ?, check_out_lng = ?,
            status = ?, work_hours = ?,
            outdoor_duty_id = COALESCE(outdoor_duty_id, ?)
        WHERE id = ? AND check_out IS NULL
        "#,
    )
    .bind(now)
    .bind(location.map(|p| p.latitude))
    .bind(location.map(|p| p.longitude))
    .bind(outcome.status.as_ref())
    .bind(outcome.work_hours)
    .bind(duties.first().map(|d| d.id))
    .bind(record.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RuleViolation::AlreadyCheckedOut.into());
    }

    info!(status = %outcome.status, work_hours = outcome.work_hours, "Checked out");

    let calendar = work_calendar(pool, &settings, today, today).await?;
    if calendar.is_off_day(today)
        && outcome.status != AttendanceStatus::Absent
        && credit_comp_off(pool, auth.user_id, today, CompOffSource::OffDayAttendance).await?
    {
        info!(%today, "Comp-off credited for off-day attendance");
    }

    Ok(HttpResponse::Ok().json(reload(pool, record.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Own record for today, null when nothing is recorded", body = Attendance),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    settings: web::Data<SettingsCache>,
) -> AppResult<HttpResponse> {
    let settings = settings.get(pool.get_ref()).await?;
    let today = local_today(Utc::now(), settings.offset());
    let record = attendance_for_day(pool.get_ref(), auth.user_id, today).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceFilter),
    responses(
        (status = 200, description = "Paginated attendance history", body = AttendancePage),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Employees cannot list other users")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceFilter>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let (page, per_page, offset) = pagination(query.page, query.per_page);

    let mut filters = Filters::new();
    filters
        .push_opt("user_id = ?", auth.scope_user(query.user_id)?, FilterValue::U64)
        .push_opt("date >= ?", query.from, FilterValue::Date)
        .push_opt("date <= ?", query.to, FilterValue::Date)
        .push_opt("status = ?", query.status, |s| FilterValue::Str(s.to_string()));

    let (data, total) = fetch_page::<Attendance>(
        pool.get_ref(),
        attendance_columns!(),
        "attendance",
        &filters,
        "date DESC, id DESC",
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
    put,
    path = "/api/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance record id")),
    request_body = UpdateAttendance,
    responses(
        (status = 200, description = "Corrected record", body = Attendance),
        (status = 400, description = "Inconsistent timestamps"),
        (status = 403, description = "Admin/Subadmin only"),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "correct_attendance", skip(pool, settings, body), fields(by = auth.user_id))]
pub async fn update_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    settings: web::Data<SettingsCache>,
    path: web::Path<u64>,
    body: web::Json<UpdateAttendance>,
) -> AppResult<HttpResponse> {
    auth.require_manager()?;

    let pool = pool.get_ref();
    let id = path.into_inner();
    let record = reload(pool, id).await?;
    let settings = settings.get(pool).await?;
    let offset = settings.offset();
    let policy = settings.policy();
    let body = body.into_inner();

    let check_in = body.check_in.or(record.check_in);
    let check_out = body.check_out.or(record.check_out);

    for at in [check_in, check_out].into_iter().flatten() {
        if to_local(at, offset).date() != record.date {
            return Err(AppError::bad_request(
                "check_in and check_out must fall on the record date",
            ));
        }
    }

    let duties = approved_duties_on(pool, record.user_id, record.date).await?;
    let first_start = duties.first().map(|d| d.start_time);

    let (computed, work_hours) = match (check_in, check_out) {
        (Some(ci), Some(co)) => {
            let local_in = to_local(ci, offset);
            let outcome = classify_check_out(
                &policy,
                &CheckOutInput {
                    check_in: local_in,
                    check_out: to_local(co, offset),
                    check_in_status: classify_arrival(&policy, local_in.time(), first_start),
                    outdoor_duties: duty_spans(record.date, &duties),
                },
            )?;
            (outcome.status, Some(outcome.work_hours))
        }
        (Some(ci), None) => (
            classify_arrival(&policy, to_local(ci, offset).time(), first_start),
            record.work_hours,
        ),
        (None, Some(_)) => return Err(AppError::bad_request("check_out requires check_in")),
        (None, None) => (record.status, record.work_hours),
    };
    let status = body.status.unwrap_or(computed);

    sqlx::query(
        r#"
        UPDATE attendance
        SET check_in = ?, check_out = ?, status = ?, work_hours = ?, note = COALESCE(?, note)
        WHERE id = ?
        "#,
    )
    .bind(check_in)
    .bind(check_out)
    .bind(status.as_ref())
    .bind(work_hours)
    .bind(&body.note)
    .bind(id)
    .execute(pool)
    .await?;

    info!(attendance_id = id, user_id = record.user_id, %status, "Attendance corrected");

    Ok(HttpResponse::Ok().json(reload(pool, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/attendance/auto-checkout",
    params(SweepQuery),
    responses(
        (status = 200, description = "Sweep result", body = Object, example = json!({
            "date": "2025-06-02",
            "checked_out": 3
        })),
        (status = 403, description = "Admin/Subadmin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn trigger_auto_checkout(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    settings: web::Data<SettingsCache>,
    query: web::Query<SweepQuery>,
) -> AppResult<HttpResponse> {
    auth.require_manager()?;

    let settings = settings.get(pool.get_ref()).await?;
    let now = Utc::now();
    let date = query
        .date
        .unwrap_or_else(|| local_today(now, settings.offset()));

    let checked_out = run_sweep(pool.get_ref(), &settings, date, now).await?;
    info!(%date, checked_out, by = auth.user_id, "Manual auto-checkout sweep");

    Ok(HttpResponse::Ok().json(json!({
        "date": date,
        "checked_out": checked_out,
    })))
}
