use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::comp_off::{CompOff, CompOffSource, comp_off_columns};
use crate::models::{Page, pagination};
use crate::utils::db_utils::{FilterValue, Filters, credit_comp_off, fetch_page};

#[derive(Debug, Deserialize, IntoParams)]
pub struct CompOffFilter {
    pub user_id: Option<u64>,
    /// Only entries that can still be spent
    pub unused_only: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantCompOff {
    pub user_id: u64,
    #[schema(example = "2025-06-07")]
    pub earned_date: NaiveDate,
}

#[utoipa::path(
    get,
    path = "/api/comp-offs",
    params(CompOffFilter),
    responses(
        (status = 200, description = "Comp-off ledger entries", body = CompOffPage),
        (status = 403, description = "Employees cannot list other users")
    ),
    security(("bearer_auth" = [])),
    tag = "Comp-off"
)]
pub async fn list_comp_offs(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<CompOffFilter>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let (page, per_page, offset) = pagination(query.page, query.per_page);

    let mut filters = Filters::new();
    filters.push_opt("user_id = ?", auth.scope_user(query.user_id)?, FilterValue::U64);
    if query.unused_only.unwrap_or(false) {
        filters.push("used = ?", FilterValue::Bool(false));
    }

    let (data, total) = fetch_page::<CompOff>(
        pool.get_ref(),
        comp_off_columns!(),
        "comp_offs",
        &filters,
        "earned_date DESC",
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
    post,
    path = "/api/comp-offs",
    request_body = GrantCompOff,
    responses(
        (status = 201, description = "Comp-off granted", body = CompOff),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found"),
        (status = 409, description = "User already has a comp-off for that date")
    ),
    security(("bearer_auth" = [])),
    tag = "Comp-off"
)]
pub async fn grant_comp_off(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<GrantCompOff>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let pool = pool.get_ref();
    let exists = sqlx::query_scalar::<_, i64>("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
        .bind(body.user_id)
        .fetch_one(pool)
        .await?;
    if exists == 0 {
        return Err(AppError::not_found("User not found"));
    }

    if !credit_comp_off(pool, body.user_id, body.earned_date, CompOffSource::Manual).await? {
        return Err(AppError::conflict("User already has a comp-off for that date"));
    }

    let entry = sqlx::query_as::<_, CompOff>(concat!(
        "SELECT ",
        comp_off_columns!(),
        " FROM comp_offs WHERE user_id = ? AND earned_date = ?"
    ))
    .bind(body.user_id)
    .bind(body.earned_date)
    .fetch_one(pool)
    .await?;

    info!(
        user_id = body.user_id,
        earned_date = %body.earned_date,
        by = auth.user_id,
        "Comp-off granted"
    );
    Ok(HttpResponse::Created().json(entry))
}
