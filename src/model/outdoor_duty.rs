use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::request_status::RequestStatus;

/// Field work window on a single office-local day.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct OutdoorDuty {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "2025-06-02")]
    pub date: NaiveDate,
    #[schema(example = "14:00:00", value_type = String)]
    pub start_time: NaiveTime,
    #[schema(example = "18:30:00", value_type = String)]
    pub end_time: NaiveTime,
    pub purpose: String,
    pub location: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: RequestStatus,
    pub reviewed_by: Option<u64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OutdoorDuty {
    pub fn window(&self) -> (NaiveTime, NaiveTime) {
        (self.start_time, self.end_time)
    }
}

macro_rules! outdoor_duty_columns {
    () => {
        "id, user_id, date, start_time, end_time, purpose, \
             location, status, reviewed_by, reviewed_at, review_note, created_at"
    };
}
pub(crate) use outdoor_duty_columns;
