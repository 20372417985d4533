use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

use crate::rules::RuleViolation;

pub type AppResult<T> = Result<T, AppError>;

/// Every handler error ends up here and is rendered as `{"message": ...}`.
#[derive(Debug, Display)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    #[display(fmt = "outside office geofence")]
    OutsideGeofence { distance_m: f64, radius_m: f64 },
    /// Details are logged where the error is created, never sent to the client.
    #[display(fmt = "Internal Server Error")]
    Internal,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::OutsideGeofence { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::OutsideGeofence {
                distance_m,
                radius_m,
            } => json!({
                "message": "You are outside the office geofence",
                "distance_m": distance_m.round(),
                "radius_m": radius_m,
            }),
            other => json!({ "message": other.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!(error = %e, "Database error");
        AppError::Internal
    }
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(e: argon2::password_hash::Error) -> Self {
        tracing::error!(error = %e, "Password hashing error");
        AppError::Internal
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        tracing::error!(error = %e, "Token encoding error");
        AppError::Internal
    }
}

impl From<RuleViolation> for AppError {
    fn from(v: RuleViolation) -> Self {
        match v {
            RuleViolation::OutsideGeofence {
                distance_m,
                radius_m,
            } => AppError::OutsideGeofence {
                distance_m,
                radius_m,
            },
            RuleViolation::Overlap(_)
            | RuleViolation::AlreadyCheckedIn
            | RuleViolation::AlreadyCheckedOut
            | RuleViolation::OnLeave => AppError::Conflict(v.to_string()),
            _ => AppError::BadRequest(v.to_string()),
        }
    }
}

/// Returns true for MySQL duplicate-key failures (SQLSTATE 23000).
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23000"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn geofence_error_carries_distance() {
        let err = AppError::OutsideGeofence {
            distance_m: 250.4,
            radius_m: 100.0,
        };
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["distance_m"], 250.0);
        assert_eq!(value["radius_m"], 100.0);
    }

    #[actix_web::test]
    async fn internal_error_hides_details() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["message"], "Internal Server Error");
    }

    #[test]
    fn rule_violations_map_to_status_codes() {
        assert_eq!(
            AppError::from(RuleViolation::LocationRequired).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(RuleViolation::AlreadyCheckedOut).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(RuleViolation::Overlap("leave".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::from(RuleViolation::OnLeave).status_code(), StatusCode::CONFLICT);
    }
}
