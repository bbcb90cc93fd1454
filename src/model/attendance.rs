use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::service::time_utils::hhmm_opt;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum DayType {
    Full,
    Half,
}

/// One row per employee per calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: u64,
    pub employee_id: u64,
    pub date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// distance from the office at check-in, meters
    pub distance_m: Option<f64>,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    #[sqlx(try_from = "String")]
    pub day_type: DayType,
    pub late_comment: Option<String>,
    pub regularised: bool,
    pub audit: Option<Json<AuditSnapshot>>,
}

/// Column list matching [`AttendanceRecord`].
pub const ATTENDANCE_COLUMNS: &str = "id, employee_id, date, check_in, check_out, latitude, longitude, \
                                      distance_m, status, day_type, late_comment, regularised, audit";

impl AttendanceRecord {
    pub fn state(&self) -> AttendanceState {
        AttendanceState {
            status: self.status,
            check_in: self.check_in,
            check_out: self.check_out,
        }
    }
}

/// Status and punches of one attendance day, as shown in regularisation
/// requests and audit trails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceState {
    #[schema(example = "Present", value_type = String)]
    pub status: AttendanceStatus,
    #[serde(default, with = "hhmm_opt")]
    #[schema(example = "09:30:00", value_type = Option<String>)]
    pub check_in: Option<NaiveTime>,
    #[serde(default, with = "hhmm_opt")]
    #[schema(example = "18:00:00", value_type = Option<String>)]
    pub check_out: Option<NaiveTime>,
}

impl AttendanceState {
    pub fn absent() -> Self {
        Self {
            status: AttendanceStatus::Absent,
            check_in: None,
            check_out: None,
        }
    }

    pub fn present() -> Self {
        Self {
            status: AttendanceStatus::Present,
            check_in: None,
            check_out: None,
        }
    }
}

/// Regularisation audit trail stored on the attendance row.
///
/// `current`/`requested` are captured when the request is submitted;
/// `before`/`after` and the approver are added when it is approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSnapshot {
    pub date: NaiveDate,
    pub current: AttendanceState,
    pub requested: AttendanceState,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<AttendanceState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<AttendanceState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<NaiveDateTime>,
}
