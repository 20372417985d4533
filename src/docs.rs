use crate::api::attendance::{CheckInRequest, CheckOutRequest, UpdateAttendance};
use crate::api::comp_off::GrantCompOff;
use crate::api::holiday::CreateHoliday;
use crate::api::leave::{ApplyLeave, BalanceResponse};
use crate::api::outdoor_duty::RequestOutdoorDuty;
use crate::api::report::{DailyReport, Dashboard, EmployeeRef};
use crate::api::settings::SettingsView;
use crate::api::user::{ChangePassword, CreateUser, UpdateUser};
use crate::model::attendance::{Attendance, AttendanceStatus};
use crate::model::comp_off::{CompOff, CompOffSource};
use crate::model::holiday::Holiday;
use crate::model::leave::{Leave, LeaveType};
use crate::model::outdoor_duty::OutdoorDuty;
use crate::model::request_status::{RequestStatus, ReviewNote};
use crate::model::role::Role;
use crate::model::settings::{Settings, UpdateSettings};
use crate::model::user::User;
use crate::models::{
    AttendancePage, CompOffPage, LeavePage, LoginReqDto, OutdoorDutyPage, TokenPair, UserPage,
};
use crate::rules::leave::LeaveBalance;
use crate::rules::report::{MonthlySummary, StatusCounts};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance & Leave API",
        version = "1.0.0",
        description = r#"
## Employee Attendance, Leave & Outdoor Duty

Backend for a small organisation's attendance book.

### Key Features
- **Attendance**
  - Geofenced check-in/check-out with automatic status (present, late, half day, early leave, absent)
  - Automatic check-out for employees on outdoor duty
- **Leave**
  - Apply, approve, reject and cancel leave; yearly quotas and comp-off days
- **Outdoor Duty**
  - Pre-approved field work that stands in for on-site presence
- **Administration**
  - Users, holidays, office settings and reports

### Security
Endpoints under `/api` require a JWT **access** token.
`admin` manages everything, `subadmin` reviews requests and reads reports,
`employee` works on their own records.

### Response Format
- JSON everywhere, errors as `{"message": "..."}`
- List endpoints are paginated (`page`, `per_page`)
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,
        crate::api::attendance::list_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::trigger_auto_checkout,

        crate::api::leave::apply_leave,
        crate::api::leave::list_leaves,
        crate::api::leave::get_leave,
        crate::api::leave::approve_leave,
        crate::api::leave::reject_leave,
        crate::api::leave::cancel_leave,
        crate::api::leave::leave_balance,

        crate::api::outdoor_duty::request_duty,
        crate::api::outdoor_duty::list_duties,
        crate::api::outdoor_duty::get_duty,
        crate::api::outdoor_duty::approve_duty,
        crate::api::outdoor_duty::reject_duty,
        crate::api::outdoor_duty::cancel_duty,

        crate::api::comp_off::list_comp_offs,
        crate::api::comp_off::grant_comp_off,

        crate::api::holiday::list_holidays,
        crate::api::holiday::create_holiday,
        crate::api::holiday::delete_holiday,

        crate::api::settings::get_settings,
        crate::api::settings::update_settings,

        crate::api::user::create_user,
        crate::api::user::list_users,
        crate::api::user::me,
        crate::api::user::get_user,
        crate::api::user::update_user,
        crate::api::user::deactivate_user,
        crate::api::user::change_password,

        crate::api::report::daily_report,
        crate::api::report::monthly_report,
        crate::api::report::dashboard
    ),
    components(
        schemas(
            LoginReqDto,
            TokenPair,
            Role,
            User,
            CreateUser,
            UpdateUser,
            ChangePassword,
            UserPage,
            Attendance,
            AttendanceStatus,
            AttendancePage,
            CheckInRequest,
            CheckOutRequest,
            UpdateAttendance,
            Leave,
            LeaveType,
            LeavePage,
            ApplyLeave,
            LeaveBalance,
            BalanceResponse,
            RequestStatus,
            ReviewNote,
            OutdoorDuty,
            OutdoorDutyPage,
            RequestOutdoorDuty,
            CompOff,
            CompOffSource,
            CompOffPage,
            GrantCompOff,
            Holiday,
            CreateHoliday,
            Settings,
            UpdateSettings,
            SettingsView,
            StatusCounts,
            MonthlySummary,
            EmployeeRef,
            DailyReport,
            Dashboard
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and token rotation"),
        (name = "Attendance", description = "Check-in, check-out and corrections"),
        (name = "Leave", description = "Leave requests and balances"),
        (name = "Outdoor Duty", description = "Field work requests"),
        (name = "Comp-off", description = "Compensatory off ledger"),
        (name = "Holidays", description = "Holiday calendar"),
        (name = "Settings", description = "Office hours, geofence and quotas"),
        (name = "Users", description = "User management and profile"),
        (name = "Reports", description = "Daily, monthly and dashboard reports"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_protected_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/attendance/check-in"));
        assert!(doc.paths.paths.contains_key("/api/leaves/{id}/approve"));
        assert!(
            doc.components
                .as_ref()
                .is_some_and(|c| c.security_schemes.contains_key("bearer_auth"))
        );
    }
}
