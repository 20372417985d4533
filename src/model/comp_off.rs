use chrono::{DateTime, NaiveDate, Utc};
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
pub enum CompOffSource {
    /// Credited automatically when checking out on a weekly off day or holiday
    OffDayAttendance,
    Manual,
}

/// Ledger entry: one compensatory day earned on `earned_date`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct CompOff {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "2025-06-07")]
    pub earned_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub source: CompOffSource,
    pub used: bool,
    /// Leave that consumed this entry
    pub leave_id: Option<u64>,
    pub created_at: DateTime<Utc>,
}

macro_rules! comp_off_columns {
    () => {
        "id, user_id, earned_date, source, used, leave_id, created_at"
    };
}
pub(crate) use comp_off_columns;
