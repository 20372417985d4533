use crate::config::Config;
use crate::error::AppError;
use crate::{auth::jwt::verify_token, model::role::Role, models::TokenType};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Set by the auth middleware on the protected scope.
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::unauthorized("Missing token"))?;

    let config = req.app_data::<Data<Config>>().ok_or_else(|| {
        tracing::error!("Config missing from app data");
        AppError::Internal
    })?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::unauthorized("Invalid token"))?;

    if claims.token_type != TokenType::Access {
        return Err(AppError::unauthorized("Invalid token"));
    }

    Ok(AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role: claims.role,
    })
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin only"))
        }
    }

    pub fn require_manager(&self) -> Result<(), AppError> {
        if self.is_manager() {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin/Subadmin only"))
        }
    }

    pub fn is_manager(&self) -> bool {
        self.role.is_manager()
    }

    /// Employees only see their own records; managers see everyone's.
    pub fn ensure_can_access(&self, user_id: u64) -> Result<(), AppError> {
        if self.user_id == user_id || self.is_manager() {
            Ok(())
        } else {
            Err(AppError::forbidden("Not allowed to access another user's records"))
        }
    }

    /// Resolves the `user_id` filter of list endpoints.
    pub fn scope_user(&self, requested: Option<u64>) -> Result<Option<u64>, AppError> {
        match requested {
            Some(id) => self.ensure_can_access(id).map(|_| Some(id)),
            None if self.is_manager() => Ok(None),
            None => Ok(Some(self.user_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: 5,
            username: "someone".into(),
            role,
        }
    }

    #[test]
    fn employees_are_scoped_to_themselves() {
        let employee = user(Role::Employee);
        assert_eq!(employee.scope_user(None).unwrap(), Some(5));
        assert_eq!(employee.scope_user(Some(5)).unwrap(), Some(5));
        assert!(employee.scope_user(Some(6)).is_err());
        assert!(employee.require_manager().is_err());
    }

    #[test]
    fn managers_see_everyone() {
        let sub = user(Role::Subadmin);
        assert_eq!(sub.scope_user(None).unwrap(), None);
        assert_eq!(sub.scope_user(Some(9)).unwrap(), Some(9));
        assert!(sub.require_manager().is_ok());
        assert!(sub.require_admin().is_err());
        assert!(user(Role::Admin).require_admin().is_ok());
    }
}
