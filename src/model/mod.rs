pub mod attendance;
pub mod comp_off;
pub mod holiday;
pub mod leave;
pub mod outdoor_duty;
pub mod request_status;
pub mod role;
pub mod settings;
pub mod user;

/// Enums are stored as their snake_case names in VARCHAR columns; this lets
/// `#[sqlx(try_from = "String")]` decode them straight into `FromRow` structs.
macro_rules! string_column {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl TryFrom<String> for $ty {
                type Error = strum::ParseError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    value.parse()
                }
            }
        )+
    };
}

string_column!(
    attendance::AttendanceStatus,
    comp_off::CompOffSource,
    leave::LeaveType,
    request_status::RequestStatus,
    role::Role,
);
