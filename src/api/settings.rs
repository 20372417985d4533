use actix_web::{HttpResponse, web};
use chrono::{Datelike, Utc};
use serde::Serialize;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::holiday::holidays_in_year;
use crate::auth::auth::AuthUser;
use crate::error::AppResult;
use crate::model::holiday::Holiday;
use crate::model::settings::{Settings, UpdateSettings};
use crate::rules::clock::local_today;
use crate::utils::settings_cache::{SettingsCache, load_settings, save_settings};

#[derive(Debug, Serialize, ToSchema)]
pub struct SettingsView {
    pub settings: Settings,
    /// Holidays of the current office-local year
    pub holidays: Vec<Holiday>,
}

#[utoipa::path(
    get,
    path = "/api/settings",
    responses(
        (status = 200, description = "Office settings with this year's holidays", body = SettingsView),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Settings"
)]
pub async fn get_settings(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SettingsCache>,
) -> AppResult<HttpResponse> {
    let settings = cache.get(pool.get_ref()).await?;
    let year = local_today(Utc::now(), settings.offset()).year();
    let holidays = holidays_in_year(pool.get_ref(), Some(year)).await?;

    Ok(HttpResponse::Ok().json(SettingsView {
        settings: settings.as_ref().clone(),
        holidays,
    }))
}

#[utoipa::path(
    put,
    path = "/api/settings",
    request_body = UpdateSettings,
    responses(
        (status = 200, description = "Merged and saved settings", body = Settings),
        (status = 400, description = "Resulting settings are inconsistent"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Settings"
)]
#[instrument(name = "update_settings", skip(pool, cache, body), fields(by = auth.user_id))]
pub async fn update_settings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SettingsCache>,
    body: web::Json<UpdateSettings>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let pool = pool.get_ref();
    let current = load_settings(pool).await?;
    let next = current.apply(body.into_inner())?;

    save_settings(pool, &next).await?;
    cache.invalidate().await;

    info!(?next, "Settings updated");
    Ok(HttpResponse::Ok().json(next))
}
