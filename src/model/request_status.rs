use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Review state shared by leave and outdoor-duty requests.
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
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Debug, Default, serde::Deserialize, ToSchema)]
pub struct ReviewNote {
    #[schema(example = "Client visit confirmed")]
    pub note: Option<String>,
}
