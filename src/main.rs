use std::time::Duration;

use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod jobs;
mod model;
mod models;
mod routes;
mod rules;
mod utils;

use config::Config;
use db::{bootstrap_admin, init_db};

use crate::docs::ApiDoc;
use crate::jobs::auto_checkout;
use crate::routes::RateLimits;
use crate::utils::settings_cache::SettingsCache;
use crate::utils::username_filter;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/health")]
async fn health() -> impl Responder {
    "OK"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config.database_url).await?;

    if let Some(admin) = &config.bootstrap_admin {
        bootstrap_admin(&pool, admin).await?;
    }

    let settings_cache = SettingsCache::new(Duration::from_secs(config.settings_cache_ttl_secs));
    let limits = RateLimits::from_config(&config)?;

    let pool_for_filter_warmup = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = username_filter::warmup(&pool_for_filter_warmup, 500).await {
            error!(error = ?e, "Failed to warm up username filter");
        }
    });

    auto_checkout::spawn_scheduler(
        pool.clone(),
        settings_cache.clone(),
        Duration::from_secs(config.auto_checkout_interval_secs),
    );

    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                // wildcard {_:.*} so the UI's JS/CSS assets resolve
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(settings_cache.clone()))
            .service(health)
            .configure(|cfg| routes::configure(cfg, &config, &limits))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
