use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::{
    attendance::Attendance, comp_off::CompOff, leave::Leave, outdoor_duty::OutdoorDuty,
    role::Role, user::User,
};

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "jdoe")]
    pub username: String,
    #[schema(example = "s3cret-pass")]
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}

/// Shape shared by every paginated list endpoint.
#[derive(Serialize, ToSchema)]
#[aliases(
    AttendancePage = Page<Attendance>,
    LeavePage = Page<Leave>,
    OutdoorDutyPage = Page<OutdoorDuty>,
    UserPage = Page<User>,
    CompOffPage = Page<CompOff>
)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

/// Normalized `(page, per_page, offset)` from optional query parameters.
pub fn pagination(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, u64) {
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    let page = page.unwrap_or(1).max(1);
    let offset = u64::from(page - 1) * u64::from(per_page);
    (page, per_page, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_clamped() {
        assert_eq!(pagination(None, None), (1, 20, 0));
        assert_eq!(pagination(Some(0), Some(0)), (1, 1, 0));
        assert_eq!(pagination(Some(3), Some(500)), (3, 100, 200));
    }
}
