use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin,
    Subadmin,
    Employee,
}

impl Role {
    /// Admins and subadmins review requests and see everyone's records.
    pub fn is_manager(self) -> bool {
        matches!(self, Role::Admin | Role::Subadmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_names() {
        assert_eq!("subadmin".parse::<Role>().unwrap(), Role::Subadmin);
        assert_eq!(Role::Employee.as_ref(), "employee");
        assert!("hr".parse::<Role>().is_err());
    }

    #[test]
    fn managers() {
        assert!(Role::Admin.is_manager());
        assert!(Role::Subadmin.is_manager());
        assert!(!Role::Employee.is_manager());
    }
}
