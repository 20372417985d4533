use anyhow::{Context, Result};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use tracing::{info, warn};

use crate::auth::password::{MIN_PASSWORD_LEN, hash_password};
use crate::config::BootstrapAdmin;
use crate::model::settings::Settings;
use crate::utils::settings_cache::save_settings;
use crate::utils::username_filter::normalize;

pub async fn init_db(database_url: &str) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    ensure_settings(&pool).await?;
    Ok(pool)
}

/// Writes the default office settings when the row has never been saved.
async fn ensure_settings(pool: &MySqlPool) -> Result<()> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT EXISTS(SELECT 1 FROM settings WHERE id = 1)")
        .fetch_one(pool)
        .await
        .context("settings table is missing, load sql/schema.sql first")?;

    if exists == 0 {
        save_settings(pool, &Settings::default()).await?;
        info!("Default office settings written");
    }
    Ok(())
}

/// Creates the first admin account, only while no admin exists yet.
pub async fn bootstrap_admin(pool: &MySqlPool, admin: &BootstrapAdmin) -> Result<()> {
    let admins = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(pool)
        .await?;
    if admins > 0 {
        return Ok(());
    }

    if admin.password.chars().count() < MIN_PASSWORD_LEN {
        warn!("BOOTSTRAP_ADMIN_PASSWORD is too short, no admin created");
        return Ok(());
    }

    let username = normalize(&admin.username);
    let password_hash = hash_password(&admin.password)
        .map_err(|e| anyhow::anyhow!("failed to hash bootstrap password: {e}"))?;

    sqlx::query(
        r#"
        INSERT INTO users (username, password, full_name, role, is_active, created_at)
        VALUES (?, ?, ?, 'admin', 1, UTC_TIMESTAMP())
        "#,
    )
    .bind(&username)
    .bind(&password_hash)
    .bind("Administrator")
    .execute(pool)
    .await
    .context("failed to create bootstrap admin")?;

    info!(%username, "Bootstrap admin created");
    Ok(())
}
