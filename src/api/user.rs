use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};

use super::{clean_text, require_text};
use crate::auth::auth::AuthUser;
use crate::auth::password::{MIN_PASSWORD_LEN, hash_password, verify_password};
use crate::error::{AppError, AppResult, is_unique_violation};
use crate::model::role::Role;
use crate::model::user::{User, UserCredentials, user_columns};
use crate::models::{Page, pagination};
use crate::utils::db_utils::{FilterValue, Filters, fetch_page};
use crate::utils::username_filter::{is_username_available, mark_taken, normalize};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUser {
    #[schema(example = "jdoe")]
    pub username: String,
    #[schema(example = "s3cret-pass")]
    pub password: String,
    #[schema(example = "John Doe")]
    pub full_name: String,
    pub email: Option<String>,
    pub department: Option<String>,
    /// Defaults to `employee`
    pub role: Option<Role>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUser {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UserFilter {
    #[param(value_type = Option<String>, example = "employee")]
    pub role: Option<Role>,
    pub department: Option<String>,
    pub is_active: Option<bool>,
    /// Matches username, full name or email
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn valid_username(username: &str) -> bool {
    (3..=50).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

fn ensure_password_strength(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Argon2 is deliberately slow; keep it off the async workers.
async fn hash_blocking(password: String) -> AppResult<String> {
    web::block(move || hash_password(&password))
        .await
        .map_err(|e| {
            error!(error = %e, "Password hashing task failed");
            AppError::Internal
        })?
        .map_err(AppError::from)
}

async fn fetch_user(pool: &MySqlPool, id: u64) -> AppResult<User> {
    sqlx::query_as::<_, User>(concat!("SELECT ", user_columns!(), " FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

/// Inserts a user whose username has already been normalized.
pub async fn insert_user(
    pool: &MySqlPool,
    username: &str,
    password_hash: &str,
    full_name: &str,
    email: Option<String>,
    department: Option<String>,
    role: Role,
) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, password, full_name, email, department, role, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 1, UTC_TIMESTAMP())
        "#,
    )
    .bind(username)
    .bind(password_hash)
    .bind(full_name)
    .bind(email)
    .bind(department)
    .bind(role.as_ref())
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::conflict("Username already taken")
        } else {
            AppError::from(e)
        }
    })?;

    mark_taken(username);
    Ok(result.last_insert_id())
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid username, password or name"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Username already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
#[instrument(name = "create_user", skip(pool, body), fields(by = auth.user_id))]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<CreateUser>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let pool = pool.get_ref();
    let body = body.into_inner();

    let username = normalize(&body.username);
    if !valid_username(&username) {
        return Err(AppError::bad_request(
            "Username must be 3-50 characters of letters, digits, '.', '_' or '-'",
        ));
    }
    ensure_password_strength(&body.password)?;
    let full_name = require_text(&body.full_name, "full_name")?;

    if !is_username_available(&username, pool).await? {
        return Err(AppError::conflict("Username already taken"));
    }

    let password_hash = hash_blocking(body.password).await?;
    let role = body.role.unwrap_or(Role::Employee);

    let id = insert_user(
        pool,
        &username,
        &password_hash,
        &full_name,
        clean_text(body.email),
        clean_text(body.department),
        role,
    )
    .await?;

    info!(user_id = id, %username, %role, "User created");
    Ok(HttpResponse::Created().json(fetch_user(pool, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(UserFilter),
    responses(
        (status = 200, description = "Paginated users", body = UserPage),
        (status = 403, description = "Admin/Subadmin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<UserFilter>,
) -> AppResult<HttpResponse> {
    auth.require_manager()?;

    let query = query.into_inner();
    let (page, per_page, offset) = pagination(query.page, query.per_page);

    let mut filters = Filters::new();
    filters
        .push_opt("role = ?", query.role, |r| FilterValue::Str(r.to_string()))
        .push_opt("department = ?", clean_text(query.department), FilterValue::Str)
        .push_opt("is_active = ?", query.is_active, FilterValue::Bool);

    if let Some(search) = clean_text(query.search) {
        let like = format!("%{search}%");
        filters.push_many(
            "(username LIKE ? OR full_name LIKE ? OR email LIKE ?)",
            [
                FilterValue::Str(like.clone()),
                FilterValue::Str(like.clone()),
                FilterValue::Str(like),
            ],
        );
    }

    let (data, total) = fetch_page::<User>(
        pool.get_ref(),
        user_columns!(),
        "users",
        &filters,
        "full_name ASC, id ASC",
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
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Profile of the caller", body = User),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(fetch_user(pool.get_ref(), auth.user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 403, description = "Not allowed to view other users"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    auth.ensure_can_access(id)?;
    Ok(HttpResponse::Ok().json(fetch_user(pool.get_ref(), id).await?))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 400, description = "Admins cannot demote or deactivate themselves"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<UpdateUser>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let pool = pool.get_ref();
    let id = path.into_inner();
    let body = body.into_inner();

    let demotes_self = body.role.is_some_and(|r| r != Role::Admin) || body.is_active == Some(false);
    if id == auth.user_id && demotes_self {
        return Err(AppError::bad_request("Admins cannot demote or deactivate themselves"));
    }

    let full_name = match body.full_name {
        Some(name) => Some(require_text(&name, "full_name")?),
        None => None,
    };

    let result = sqlx::query(
        r#"
        UPDATE users
        SET full_name = COALESCE(?, full_name),
            email = COALESCE(?, email),
            department = COALESCE(?, department),
            role = COALESCE(?, role),
            is_active = COALESCE(?, is_active)
        WHERE id = ?
        "#,
    )
    .bind(full_name)
    .bind(clean_text(body.email))
    .bind(clean_text(body.department))
    .bind(body.role.map(|r| r.to_string()))
    .bind(body.is_active)
    .bind(id)
    .execute(pool)
    .await?;

    // MySQL reports 0 affected rows when nothing changed, so check existence separately
    if result.rows_affected() == 0 {
        fetch_user(pool, id).await?;
    }

    if body.is_active == Some(false) {
        revoke_refresh_tokens(pool, id).await?;
    }

    info!(user_id = id, by = auth.user_id, "User updated");
    Ok(HttpResponse::Ok().json(fetch_user(pool, id).await?))
}

async fn revoke_refresh_tokens(pool: &MySqlPool, user_id: u64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ? AND revoked = 0")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    responses(
        (status = 204, description = "User deactivated, sessions revoked"),
        (status = 400, description = "Admins cannot deactivate themselves"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn deactivate_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let pool = pool.get_ref();
    let id = path.into_inner();
    if id == auth.user_id {
        return Err(AppError::bad_request("Admins cannot deactivate themselves"));
    }

    let result = sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        fetch_user(pool, id).await?;
    }
    revoke_refresh_tokens(pool, id).await?;

    info!(user_id = id, by = auth.user_id, "User deactivated");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    put,
    path = "/api/users/me/password",
    request_body = ChangePassword,
    responses(
        (status = 204, description = "Password changed, other sessions revoked"),
        (status = 400, description = "New password too short"),
        (status = 401, description = "Current password is wrong")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
#[instrument(name = "change_password", skip(pool, body), fields(user_id = auth.user_id))]
pub async fn change_password(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<ChangePassword>,
) -> AppResult<HttpResponse> {
    let pool = pool.get_ref();
    let body = body.into_inner();

    let creds = sqlx::query_as::<_, UserCredentials>(
        "SELECT id, username, password, role, is_active FROM users WHERE id = ?",
    )
    .bind(auth.user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))?;

    if verify_password(&body.current_password, &creds.password).is_err() {
        return Err(AppError::unauthorized("Current password is incorrect"));
    }
    ensure_password_strength(&body.new_password)?;

    let password_hash = hash_blocking(body.new_password).await?;
    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(auth.user_id)
        .execute(pool)
        .await?;
    revoke_refresh_tokens(pool, auth.user_id).await?;

    info!("Password changed");
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        let cases = [
            ("jdoe", true),
            ("j.doe-2_x", true),
            ("jd", false),
            ("john doe", false),
            ("jöhn", false),
        ];
        for (name, ok) in cases {
            assert_eq!(valid_username(name), ok, "{name}");
        }
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(ensure_password_strength("1234567").is_err());
        assert!(ensure_password_strength("12345678").is_ok());
    }
}
