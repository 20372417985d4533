pub mod attendance;
pub mod comp_off;
pub mod holiday;
pub mod leave;
pub mod outdoor_duty;
pub mod report;
pub mod settings;
pub mod user;

use sqlx::MySqlPool;

use crate::error::{AppError, AppResult};

/// Explains why a `... AND status = 'pending'` update matched no row.
pub(crate) async fn not_pending(pool: &MySqlPool, table: &str, id: u64, what: &str) -> AppError {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?)");
    match sqlx::query_scalar::<_, i64>(&sql).bind(id).fetch_one(pool).await {
        Ok(0) => AppError::not_found(format!("{what} not found")),
        Ok(_) => AppError::conflict(format!("{what} is not pending")),
        Err(e) => e.into(),
    }
}

/// Trims and drops empty strings from optional free-text fields.
pub(crate) fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn require_text(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_helpers() {
        assert_eq!(clean_text(Some("  ".into())), None);
        assert_eq!(clean_text(Some(" ok ".into())), Some("ok".into()));
        assert_eq!(require_text(" visit ", "purpose").unwrap(), "visit");
        assert!(require_text("", "purpose").is_err());
    }
}
