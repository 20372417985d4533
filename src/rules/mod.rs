//! Attendance rules: pure functions with no database or HTTP access.
//!
//! Handlers load settings and records, convert timestamps into office-local
//! time with [`clock`], and hand plain values to these functions.

pub mod calendar;
pub mod clock;
pub mod duty;
pub mod geofence;
pub mod leave;
pub mod report;
pub mod status;
pub mod sweep;

use derive_more::Display;

use crate::model::leave::LeaveType;

#[derive(Debug, Display, PartialEq)]
pub enum RuleViolation {
    #[display(fmt = "Location is required to check in")]
    LocationRequired,
    #[display(fmt = "Latitude/longitude out of range")]
    InvalidCoordinates,
    #[display(
        fmt = "Check-in is {:.0} m away from the office, allowed radius is {:.0} m",
        distance_m,
        radius_m
    )]
    OutsideGeofence { distance_m: f64, radius_m: f64 },
    #[display(fmt = "Check-out cannot be earlier than check-in")]
    CheckOutBeforeCheckIn,
    #[display(fmt = "Already checked in today")]
    AlreadyCheckedIn,
    #[display(fmt = "Already checked out today")]
    AlreadyCheckedOut,
    #[display(fmt = "You are on approved leave today")]
    OnLeave,
    #[display(fmt = "start_date cannot be after end_date")]
    InvalidDateRange,
    #[display(fmt = "start_time must be before end_time")]
    InvalidTimeWindow,
    #[display(fmt = "Selected range contains no working days")]
    NoWorkingDays,
    #[display(fmt = "Leave cannot span two calendar years")]
    SpansYears,
    #[display(
        fmt = "Insufficient {} leave balance: {} day(s) remaining, {} requested",
        leave_type,
        remaining,
        requested
    )]
    QuotaExceeded {
        leave_type: LeaveType,
        remaining: i32,
        requested: i32,
    },
    #[display(fmt = "Comp-off leave must cover exactly one working day")]
    CompOffSingleDay,
    #[display(fmt = "Overlaps an existing {}", _0)]
    Overlap(String),
    #[display(fmt = "month must be formatted as YYYY-MM")]
    InvalidMonth,
    #[display(fmt = "{}", _0)]
    InvalidSettings(String),
}
