use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::role::Role;

/// Full row, including the password hash. Never serialized to clients.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserCredentials {
    pub id: u64,
    pub username: String,
    pub password: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct User {
    pub id: u64,
    #[schema(example = "jdoe")]
    pub username: String,
    #[schema(example = "John Doe")]
    pub full_name: String,
    pub email: Option<String>,
    #[schema(example = "Field Sales")]
    pub department: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

macro_rules! user_columns {
    () => {
        "id, username, full_name, email, department, role, is_active, last_login_at, created_at"
    };
}
pub(crate) use user_columns;
