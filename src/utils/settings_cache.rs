use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::MySqlPool;

use crate::model::settings::{Settings, settings_columns};

const SETTINGS_KEY: u8 = 1;

/// Every check-in/out reads the settings row; keep it in memory for a short
/// while and drop it as soon as an admin saves new values.
#[derive(Clone)]
pub struct SettingsCache {
    cache: Cache<u8, Arc<Settings>>,
}

impl SettingsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    pub async fn get(&self, pool: &MySqlPool) -> Result<Arc<Settings>, sqlx::Error> {
        if let Some(settings) = self.cache.get(&SETTINGS_KEY).await {
            return Ok(settings);
        }

        let settings = Arc::new(load_settings(pool).await?);
        self.cache.insert(SETTINGS_KEY, settings.clone()).await;
        Ok(settings)
    }

    pub async fn invalidate(&self) {
        self.cache.invalidate(&SETTINGS_KEY).await;
    }
}

/// A missing row means nobody configured the office yet: use defaults.
pub async fn load_settings(pool: &MySqlPool) -> Result<Settings, sqlx::Error> {
    let row = sqlx::query_as::<_, Settings>(concat!(
        "SELECT ",
        settings_columns!(),
        " FROM settings WHERE id = 1"
    ))
    .fetch_optional(pool)
    .await?;
    Ok(row.unwrap_or_default())
}

pub async fn save_settings(pool: &MySqlPool, s: &Settings) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO settings (id, office_start, office_end, office_lat, office_lng,
            geofence_radius_m, late_threshold_minutes, half_day_threshold_minutes,
            early_leave_threshold_minutes, half_day_ratio, absent_ratio, utc_offset_minutes,
            weekly_off_days, casual_leave_quota, sick_leave_quota, earned_leave_quota)
        VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            office_start = VALUES(office_start),
            office_end = VALUES(office_end),
            office_lat = VALUES(office_lat),
            office_lng = VALUES(office_lng),
            geofence_radius_m = VALUES(geofence_radius_m),
            late_threshold_minutes = VALUES(late_threshold_minutes),
            half_day_threshold_minutes = VALUES(half_day_threshold_minutes),
            early_leave_threshold_minutes = VALUES(early_leave_threshold_minutes),
            half_day_ratio = VALUES(half_day_ratio),
            absent_ratio = VALUES(absent_ratio),
            utc_offset_minutes = VALUES(utc_offset_minutes),
            weekly_off_days = VALUES(weekly_off_days),
            casual_leave_quota = VALUES(casual_leave_quota),
            sick_leave_quota = VALUES(sick_leave_quota),
            earned_leave_quota = VALUES(earned_leave_quota)
        "#,
    )
    .bind(s.office_start)
    .bind(s.office_end)
    .bind(s.office_lat)
    .bind(s.office_lng)
    .bind(s.geofence_radius_m)
    .bind(s.late_threshold_minutes)
    .bind(s.half_day_threshold_minutes)
    .bind(s.early_leave_threshold_minutes)
    .bind(s.half_day_ratio)
    .bind(s.absent_ratio)
    .bind(s.utc_offset_minutes)
    .bind(&s.weekly_off_days)
    .bind(s.casual_leave_quota)
    .bind(s.sick_leave_quota)
    .bind(s.earned_leave_quota)
    .execute(pool)
    .await?;
    Ok(())
}
