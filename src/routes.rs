use crate::{
    api::{attendance, comp_off, holiday, leave, outdoor_duty, report, settings, user},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::AppError,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Context, Result};

type LimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Limiter state lives in the config, so build these once and share them
/// across workers; every `Governor::new` then draws from the same buckets.
#[derive(Clone)]
pub struct RateLimits {
    login: LimiterConfig,
    refresh: LimiterConfig,
    protected: LimiterConfig,
}

fn build_limiter(requests_per_min: u32) -> Result<LimiterConfig> {
    let requests_per_min = requests_per_min.max(1);
    GovernorConfigBuilder::default()
        .per_millisecond((60_000 / u64::from(requests_per_min)).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .context("invalid rate limit configuration")
}

impl RateLimits {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            refresh: build_limiter(config.rate_refresh_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

/// Malformed bodies, query strings and path segments answer with the same
/// `{"message": ...}` shape as every other error.
pub fn extractor_configs(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| AppError::bad_request(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| AppError::bad_request(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _| AppError::bad_request(err.to_string()).into()),
    );
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limits: &RateLimits) {
    extractor_configs(cfg);

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(Governor::new(&limits.login))
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(Governor::new(&limits.refresh))
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(Governor::new(&limits.login))
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes. Literal segments are registered before `/{id}`.
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(Governor::new(&limits.protected))
            .service(
                web::scope("/attendance")
                    .service(web::resource("").route(web::get().to(attendance::list_attendance)))
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(
                        web::resource("/check-in").route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/check-out").route(web::post().to(attendance::check_out)),
                    )
                    .service(
                        web::resource("/auto-checkout")
                            .route(web::post().to(attendance::trigger_auto_checkout)),
                    )
                    .service(
                        web::resource("/{id}").route(web::put().to(attendance::update_attendance)),
                    ),
            )
            .service(
                web::scope("/leaves")
                    .service(
                        web::resource("")
                            .route(web::get().to(leave::list_leaves))
                            .route(web::post().to(leave::apply_leave)),
                    )
                    .service(web::resource("/balance").route(web::get().to(leave::leave_balance)))
                    .service(web::resource("/{id}").route(web::get().to(leave::get_leave)))
                    .service(
                        web::resource("/{id}/approve").route(web::put().to(leave::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject").route(web::put().to(leave::reject_leave)),
                    )
                    .service(
                        web::resource("/{id}/cancel").route(web::put().to(leave::cancel_leave)),
                    ),
            )
            .service(
                web::scope("/outdoor-duties")
                    .service(
                        web::resource("")
                            .route(web::get().to(outdoor_duty::list_duties))
                            .route(web::post().to(outdoor_duty::request_duty)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(outdoor_duty::get_duty)))
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(outdoor_duty::approve_duty)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(outdoor_duty::reject_duty)),
                    )
                    .service(
                        web::resource("/{id}/cancel")
                            .route(web::put().to(outdoor_duty::cancel_duty)),
                    ),
            )
            .service(
                web::scope("/comp-offs").service(
                    web::resource("")
                        .route(web::get().to(comp_off::list_comp_offs))
                        .route(web::post().to(comp_off::grant_comp_off)),
                ),
            )
            .service(
                web::scope("/holidays")
                    .service(
                        web::resource("")
                            .route(web::get().to(holiday::list_holidays))
                            .route(web::post().to(holiday::create_holiday)),
                    )
                    .service(
                        web::resource("/{id}").route(web::delete().to(holiday::delete_holiday)),
                    ),
            )
            .service(
                web::resource("/settings")
                    .route(web::get().to(settings::get_settings))
                    .route(web::put().to(settings::update_settings)),
            )
            .service(
                web::scope("/users")
                    .service(
                        web::resource("")
                            .route(web::get().to(user::list_users))
                            .route(web::post().to(user::create_user)),
                    )
                    .service(web::resource("/me").route(web::get().to(user::me)))
                    .service(
                        web::resource("/me/password").route(web::put().to(user::change_password)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(user::get_user))
                            .route(web::put().to(user::update_user))
                            .route(web::delete().to(user::deactivate_user)),
                    ),
            )
            .service(
                web::scope("/reports")
                    .service(web::resource("/daily").route(web::get().to(report::daily_report)))
                    .service(
                        web::resource("/monthly").route(web::get().to(report::monthly_report)),
                    )
                    .service(web::resource("/dashboard").route(web::get().to(report::dashboard))),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new pair, the old refresh token is revoked

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use actix_web::http::StatusCode;
    use actix_web::{App, test as atest};

    #[actix_web::test]
    async fn protected_scope_requires_a_token() {
        let config = test_config();
        let limits = RateLimits::from_config(&config).unwrap();
        let app = atest::init_service(
            App::new()
                .app_data(web::Data::new(config.clone()))
                .configure(|cfg| configure(cfg, &config, &limits)),
        )
        .await;

        let req = atest::TestRequest::get()
            .uri("/api/attendance/today")
            .peer_addr("127.0.0.1:40000".parse().unwrap())
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn zero_rate_still_builds() {
        assert!(build_limiter(0).is_ok());
    }
}
