use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    error::{AppError, AppResult},
    model::{role::Role, user::UserCredentials},
    models::{LoginReqDto, TokenPair, TokenType},
};
use actix_web::{HttpRequest, HttpResponse, web};
use sqlx::MySqlPool;
use tracing::{debug, info, instrument, warn};

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Issues an access/refresh pair and records the refresh `jti`.
async fn issue_pair(
    pool: &MySqlPool,
    config: &Config,
    user_id: u64,
    username: &str,
    role: Role,
) -> AppResult<TokenPair> {
    let access_token = generate_access_token(
        user_id,
        username,
        role,
        &config.jwt_secret,
        config.access_token_ttl,
    )?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user_id,
        username,
        role,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )?;

    debug!(user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    info!("Login request received");

    let username = user.username.trim().to_lowercase();
    if username.is_empty() || user.password.is_empty() {
        return Err(AppError::bad_request("Username or password required"));
    }

    let db_user = sqlx::query_as::<_, UserCredentials>(
        r#"
        SELECT id, username, password, role, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(&username)
    .fetch_optional(pool.get_ref())
    .await?;

    let Some(db_user) = db_user else {
        info!("Invalid credentials: user not found");
        return Err(AppError::unauthorized("Invalid credentials"));
    };

    if verify_password(&user.password, &db_user.password).is_err() {
        info!(user_id = db_user.id, "Invalid credentials: password mismatch");
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    if !db_user.is_active {
        info!(user_id = db_user.id, "Login refused: account deactivated");
        return Err(AppError::unauthorized("Account is deactivated"));
    }

    let pair = issue_pair(
        pool.get_ref(),
        config.get_ref(),
        db_user.id,
        &db_user.username,
        db_user.role,
    )
    .await?;

    // Non-fatal
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = UTC_TIMESTAMP() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        warn!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");

    Ok(HttpResponse::Ok().json(pair))
}

#[derive(sqlx::FromRow)]
struct StoredRefreshToken {
    id: u64,
    revoked: bool,
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Refresh token missing, revoked or expired")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let token = bearer(&req).ok_or_else(|| AppError::unauthorized("No token"))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::unauthorized("Invalid token"))?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::unauthorized("Refresh token required"));
    }

    let record = sqlx::query_as::<_, StoredRefreshToken>(
        "SELECT id, revoked FROM refresh_tokens WHERE jti = ?",
    )
    .bind(&claims.jti)
    .fetch_optional(pool.get_ref())
    .await?;

    let record = match record {
        Some(r) if !r.revoked => r,
        _ => {
            warn!(user_id = claims.user_id, "Refresh with unknown or revoked token");
            return Err(AppError::unauthorized("Invalid token"));
        }
    };

    // The account may have been deactivated or demoted since the token was issued.
    let user = sqlx::query_as::<_, UserCredentials>(
        "SELECT id, username, password, role, is_active FROM users WHERE id = ?",
    )
    .bind(claims.user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .filter(|u| u.is_active)
    .ok_or_else(|| AppError::unauthorized("Invalid token"))?;

    let revoked = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ? AND revoked = 0")
        .bind(record.id)
        .execute(pool.get_ref())
        .await?;

    // Lost a race with a concurrent refresh of the same token
    if revoked.rows_affected() == 0 {
        return Err(AppError::unauthorized("Invalid token"));
    }

    let pair = issue_pair(
        pool.get_ref(),
        config.get_ref(),
        user.id,
        &user.username,
        user.role,
    )
    .await?;

    Ok(HttpResponse::Ok().json(pair))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked (always succeeds)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let Some(token) = bearer(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let Ok(claims) = verify_token(token, &config.jwt_secret) else {
        return HttpResponse::NoContent().finish();
    };

    // Only refresh tokens can be revoked
    if claims.token_type != TokenType::Refresh {
        return HttpResponse::NoContent().finish();
    }

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        warn!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}
