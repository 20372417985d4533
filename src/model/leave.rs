use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::request_status::RequestStatus;

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
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveType {
    Casual,
    Sick,
    Earned,
    Unpaid,
    CompOff,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Leave {
    pub id: u64,
    pub user_id: u64,
    #[sqlx(try_from = "String")]
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-05")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-06")]
    pub end_date: NaiveDate,
    /// Working days inside the range
    pub days: i32,
    pub reason: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: RequestStatus,
    pub comp_off_id: Option<u64>,
    pub reviewed_by: Option<u64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

macro_rules! leave_columns {
    () => {
        "id, user_id, leave_type, start_date, end_date, days, reason, \
             status, comp_off_id, reviewed_by, reviewed_at, review_note, created_at"
    };
}
pub(crate) use leave_columns;
