use chrono::{FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::leave::LeaveType;
use crate::rules::RuleViolation;
use crate::rules::calendar::{WorkCalendar, parse_weekly_offs};
use crate::rules::clock::office_offset;
use crate::rules::geofence::{GeoPoint, Geofence};
use crate::rules::status::AttendancePolicy;

/// Singleton row (`id = 1`) holding every tunable of the organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Settings {
    #[schema(example = "09:00:00", value_type = String)]
    pub office_start: NaiveTime,
    #[schema(example = "18:00:00", value_type = String)]
    pub office_end: NaiveTime,
    pub office_lat: f64,
    pub office_lng: f64,
    pub geofence_radius_m: f64,
    pub late_threshold_minutes: i32,
    pub half_day_threshold_minutes: i32,
    pub early_leave_threshold_minutes: i32,
    pub half_day_ratio: f64,
    pub absent_ratio: f64,
    /// Office wall clock relative to UTC, e.g. 330 for UTC+05:30
    pub utc_offset_minutes: i32,
    #[schema(example = "Sat,Sun")]
    pub weekly_off_days: String,
    pub casual_leave_quota: i32,
    pub sick_leave_quota: i32,
    pub earned_leave_quota: i32,
}

macro_rules! settings_columns {
    () => {
        "office_start, office_end, office_lat, office_lng, \
             geofence_radius_m, late_threshold_minutes, half_day_threshold_minutes, \
             early_leave_threshold_minutes, half_day_ratio, absent_ratio, utc_offset_minutes, \
             weekly_off_days, casual_leave_quota, sick_leave_quota, earned_leave_quota"
    };
}
pub(crate) use settings_columns;

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            office_start: hm(9, 0),
            office_end: hm(18, 0),
            office_lat: 0.0,
            office_lng: 0.0,
            geofence_radius_m: 100.0,
            late_threshold_minutes: 15,
            half_day_threshold_minutes: 120,
            early_leave_threshold_minutes: 30,
            half_day_ratio: 0.5,
            absent_ratio: 0.25,
            utc_offset_minutes: 0,
            weekly_off_days: "Sat,Sun".to_string(),
            casual_leave_quota: 12,
            sick_leave_quota: 10,
            earned_leave_quota: 15,
        }
    }
}

impl Settings {
    pub fn policy(&self) -> AttendancePolicy {
        AttendancePolicy {
            office_start: self.office_start,
            office_end: self.office_end,
            late_threshold_minutes: i64::from(self.late_threshold_minutes),
            half_day_threshold_minutes: i64::from(self.half_day_threshold_minutes),
            early_leave_threshold_minutes: i64::from(self.early_leave_threshold_minutes),
            half_day_ratio: self.half_day_ratio,
            absent_ratio: self.absent_ratio,
        }
    }

    pub fn geofence(&self) -> Geofence {
        Geofence {
            center: GeoPoint::new(self.office_lat, self.office_lng),
            radius_m: self.geofence_radius_m,
        }
    }

    pub fn offset(&self) -> FixedOffset {
        office_offset(self.utc_offset_minutes)
    }

    /// Stored values are validated on write, so a bad list here only comes
    /// from manual edits of the table; it degrades to "no weekly offs".
    pub fn calendar(&self, holidays: impl IntoIterator<Item = NaiveDate>) -> WorkCalendar {
        let offs = parse_weekly_offs(&self.weekly_off_days).unwrap_or_default();
        WorkCalendar::new(offs, holidays)
    }

    /// Yearly quota in days; `None` means unlimited or tracked elsewhere.
    pub fn quota(&self, leave_type: LeaveType) -> Option<i32> {
        match leave_type {
            LeaveType::Casual => Some(self.casual_leave_quota),
            LeaveType::Sick => Some(self.sick_leave_quota),
            LeaveType::Earned => Some(self.earned_leave_quota),
            LeaveType::Unpaid | LeaveType::CompOff => None,
        }
    }

    pub fn validate(&self) -> Result<(), RuleViolation> {
        let invalid = |msg: &str| Err(RuleViolation::InvalidSettings(msg.to_string()));

        if self.office_start >= self.office_end {
            return invalid("office_start must be before office_end");
        }
        if !GeoPoint::new(self.office_lat, self.office_lng).is_valid() {
            return invalid("office coordinates out of range");
        }
        if !(self.geofence_radius_m.is_finite() && self.geofence_radius_m > 0.0) {
            return invalid("geofence_radius_m must be positive");
        }
        if self.late_threshold_minutes < 0
            || self.half_day_threshold_minutes < 0
            || self.early_leave_threshold_minutes < 0
        {
            return invalid("thresholds cannot be negative");
        }
        if self.late_threshold_minutes > self.half_day_threshold_minutes {
            return invalid("late_threshold_minutes cannot exceed half_day_threshold_minutes");
        }
        if !(0.0..=1.0).contains(&self.half_day_ratio)
            || !(0.0..=1.0).contains(&self.absent_ratio)
            || self.absent_ratio > self.half_day_ratio
        {
            return invalid("ratios must satisfy 0 <= absent_ratio <= half_day_ratio <= 1");
        }
        if self.utc_offset_minutes.abs() > 14 * 60 {
            return invalid("utc_offset_minutes must be within +/- 14 hours");
        }
        if self.casual_leave_quota < 0 || self.sick_leave_quota < 0 || self.earned_leave_quota < 0 {
            return invalid("leave quotas cannot be negative");
        }
        parse_weekly_offs(&self.weekly_off_days)?;
        Ok(())
    }

    /// Overlays the provided fields and validates the merged result.
    pub fn apply(&self, update: UpdateSettings) -> Result<Settings, RuleViolation> {
        let mut next = self.clone();
        macro_rules! overlay {
            ($($field:ident),+ $(,)?) => {
                $(if let Some(v) = update.$field { next.$field = v; })+
            };
        }
        overlay!(
            office_start,
            office_end,
            office_lat,
            office_lng,
            geofence_radius_m,
            late_threshold_minutes,
            half_day_threshold_minutes,
            early_leave_threshold_minutes,
            half_day_ratio,
            absent_ratio,
            utc_offset_minutes,
            weekly_off_days,
            casual_leave_quota,
            sick_leave_quota,
            earned_leave_quota,
        );
        next.validate()?;
        Ok(next)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateSettings {
    #[schema(example = "09:30:00", value_type = Option<String>)]
    pub office_start: Option<NaiveTime>,
    #[schema(example = "18:30:00", value_type = Option<String>)]
    pub office_end: Option<NaiveTime>,
    pub office_lat: Option<f64>,
    pub office_lng: Option<f64>,
    pub geofence_radius_m: Option<f64>,
    pub late_threshold_minutes: Option<i32>,
    pub half_day_threshold_minutes: Option<i32>,
    pub early_leave_threshold_minutes: Option<i32>,
    pub half_day_ratio: Option<f64>,
    pub absent_ratio: Option<f64>,
    pub utc_offset_minutes: Option<i32>,
    pub weekly_off_days: Option<String>,
    pub casual_leave_quota: Option<i32>,
    pub sick_leave_quota: Option<i32>,
    pub earned_leave_quota: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
        assert_eq!(Settings::default().policy().expected_minutes(), 540);
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let current = Settings::default();
        let next = current
            .apply(UpdateSettings {
                geofence_radius_m: Some(250.0),
                weekly_off_days: Some("Fri".into()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(next.geofence_radius_m, 250.0);
        assert_eq!(next.weekly_off_days, "Fri");
        assert_eq!(next.office_start, current.office_start);
        assert_eq!(next.casual_leave_quota, current.casual_leave_quota);
    }

    #[test]
    fn rejects_inconsistent_updates() {
        let current = Settings::default();
        let bad = [
            UpdateSettings {
                office_end: Some(hm(8, 0)),
                ..Default::default()
            },
            UpdateSettings {
                geofence_radius_m: Some(0.0),
                ..Default::default()
            },
            UpdateSettings {
                late_threshold_minutes: Some(200),
                ..Default::default()
            },
            UpdateSettings {
                absent_ratio: Some(0.8),
                ..Default::default()
            },
            UpdateSettings {
                utc_offset_minutes: Some(15 * 60),
                ..Default::default()
            },
            UpdateSettings {
                weekly_off_days: Some("Someday".into()),
                ..Default::default()
            },
            UpdateSettings {
                office_lat: Some(120.0),
                ..Default::default()
            },
        ];
        for update in bad {
            let debug = format!("{update:?}");
            assert!(current.apply(update).is_err(), "{debug}");
        }
    }

    #[test]
    fn quotas_by_type() {
        let s = Settings::default();
        assert_eq!(s.quota(LeaveType::Casual), Some(12));
        assert_eq!(s.quota(LeaveType::Unpaid), None);
        assert_eq!(s.quota(LeaveType::CompOff), None);
    }
}
