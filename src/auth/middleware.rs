use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::models::TokenType;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;

fn reject(req: ServiceRequest, message: &str) -> ServiceResponse<BoxBody> {
    let resp = HttpResponse::Unauthorized().json(json!({ "message": message }));
    req.into_response(resp.map_into_boxed_body())
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let secret = match req.app_data::<Data<Config>>() {
        Some(config) => config.jwt_secret.clone(),
        None => {
            tracing::error!("Config missing from app data");
            return Err(AppError::Internal.into());
        }
    };

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(v) => v.to_owned(),
            Err(_) => return Ok(reject(req, "Invalid Authorization header encoding")),
        },
        None => return Ok(reject(req, "Missing Authorization header")),
    };

    let Some(token) = header_value.strip_prefix("Bearer ") else {
        return Ok(reject(req, "Authorization header must start with Bearer"));
    };

    let claims = match verify_token(token, &secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected token");
            return Ok(reject(req, "Invalid or expired token"));
        }
    };

    if claims.token_type != TokenType::Access {
        return Ok(reject(req, "Access token required"));
    }

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role: claims.role,
    });

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use crate::config::test_config;
    use crate::model::role::Role;
    use actix_web::http::StatusCode;
    use actix_web::middleware::from_fn;
    use actix_web::{App, HttpResponse, test, web};

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(format!("{}:{}", user.user_id, user.role))
    }

    macro_rules! app {
        () => {
            test::init_service(
                App::new().app_data(Data::new(test_config())).service(
                    web::scope("/api")
                        .wrap(from_fn(auth_middleware))
                        .route("/whoami", web::get().to(whoami)),
                ),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn missing_header_is_unauthorized() {
        let app = app!();
        let req = test::TestRequest::get().uri("/api/whoami").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn access_token_reaches_handler() {
        let app = app!();
        let secret = test_config().jwt_secret;
        let token = generate_access_token(7, "jdoe", Role::Employee, &secret, 60).unwrap();

        let req = test::TestRequest::get()
            .uri("/api/whoami")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "7:employee");
    }

    #[actix_web::test]
    async fn refresh_token_is_not_an_access_token() {
        let app = app!();
        let secret = test_config().jwt_secret;
        let (token, _) = generate_refresh_token(7, "jdoe", Role::Admin, &secret, 60).unwrap();

        let req = test::TestRequest::get()
            .uri("/api/whoami")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn garbage_token_is_unauthorized() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/api/whoami")
            .insert_header(("Authorization", "Bearer nope"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
