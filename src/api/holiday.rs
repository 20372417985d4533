use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::require_text;
use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult, is_unique_violation};
use crate::model::holiday::Holiday;

#[derive(Debug, Deserialize, IntoParams)]
pub struct HolidayQuery {
    #[param(example = 2025)]
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateHoliday {
    #[schema(example = "2025-12-25")]
    pub date: NaiveDate,
    #[schema(example = "Christmas Day")]
    pub name: String,
}

pub async fn holidays_in_year(
    pool: &MySqlPool,
    year: Option<i32>,
) -> Result<Vec<Holiday>, sqlx::Error> {
    match year {
        Some(year) => {
            sqlx::query_as::<_, Holiday>(
                "SELECT id, date, name FROM holidays WHERE YEAR(date) = ? ORDER BY date",
            )
            .bind(year)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, Holiday>("SELECT id, date, name FROM holidays ORDER BY date")
                .fetch_all(pool)
                .await
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/holidays",
    params(HolidayQuery),
    responses(
        (status = 200, description = "Holiday calendar", body = [Holiday]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Holidays"
)]
pub async fn list_holidays(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<HolidayQuery>,
) -> AppResult<HttpResponse> {
    let holidays = holidays_in_year(pool.get_ref(), query.year).await?;
    Ok(HttpResponse::Ok().json(holidays))
}

#[utoipa::path(
    post,
    path = "/api/holidays",
    request_body = CreateHoliday,
    responses(
        (status = 201, description = "Holiday added", body = Holiday),
        (status = 400, description = "Name missing"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "A holiday already exists on that date")
    ),
    security(("bearer_auth" = [])),
    tag = "Holidays"
)]
pub async fn create_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<CreateHoliday>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let name = require_text(&body.name, "name")?;

    let result = sqlx::query("INSERT INTO holidays (date, name) VALUES (?, ?)")
        .bind(body.date)
        .bind(&name)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::conflict("A holiday already exists on that date")
            } else {
                AppError::from(e)
            }
        })?;

    info!(date = %body.date, %name, by = auth.user_id, "Holiday added");

    Ok(HttpResponse::Created().json(Holiday {
        id: result.last_insert_id(),
        date: body.date,
        name,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/holidays/{id}",
    params(("id" = u64, Path, description = "Holiday id")),
    responses(
        (status = 204, description = "Holiday removed"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Holiday not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Holidays"
)]
pub async fn delete_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let id = path.into_inner();
    let result = sqlx::query("DELETE FROM holidays WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Holiday not found"));
    }

    info!(holiday_id = id, by = auth.user_id, "Holiday removed");
    Ok(HttpResponse::NoContent().finish())
}
