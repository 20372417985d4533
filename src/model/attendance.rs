use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    HalfDay,
    EarlyLeave,
    Absent,
    OnLeave,
}

/// One row per user per office-local calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "2025-06-02")]
    pub date: NaiveDate,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub check_in_lat: Option<f64>,
    pub check_in_lng: Option<f64>,
    pub check_out_lat: Option<f64>,
    pub check_out_lng: Option<f64>,
    /// Meters from the office at check-in, when a location was sent
    pub check_in_distance_m: Option<f64>,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    pub work_hours: Option<f64>,
    pub outdoor_duty_id: Option<u64>,
    pub auto_checked_out: bool,
    pub note: Option<String>,
}

/// Column list matching the `FromRow` field order, usable inside `concat!`.
macro_rules! attendance_columns {
    () => {
        "id, user_id, date, check_in, check_out, \
             check_in_lat, check_in_lng, check_out_lat, check_out_lng, check_in_distance_m, \
             status, work_hours, outdoor_duty_id, auto_checked_out, note"
    };
}
pub(crate) use attendance_columns;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_match_json_and_db() {
        assert_eq!(AttendanceStatus::HalfDay.as_ref(), "half_day");
        assert_eq!(
            serde_json::to_value(AttendanceStatus::EarlyLeave).unwrap(),
            serde_json::json!("early_leave")
        );
        assert_eq!(
            AttendanceStatus::try_from("on_leave".to_string()).unwrap(),
            AttendanceStatus::OnLeave
        );
        assert!(AttendanceStatus::try_from("sick".to_string()).is_err());
    }
}
