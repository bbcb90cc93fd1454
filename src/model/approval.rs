use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::model::attendance::AttendanceState;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApprovalKind {
    Leave,
    Regularisation,
    Reimbursement,
    Remuneration,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    /// Approved through the admin override path. Kept distinct from
    /// `Approved`; views decide whether to show them alike.
    Overridden,
}

impl ApprovalStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }

    /// Whether the request took effect, i.e. `Approved` or `Overridden`.
    pub fn is_effectively_approved(self) -> bool {
        matches!(self, ApprovalStatus::Approved | ApprovalStatus::Overridden)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LeavePayload {
    #[schema(example = "sick")]
    pub leave_type: String,
    #[schema(example = "2024-06-10", format = "date", value_type = String)]
    pub from_date: NaiveDate,
    #[schema(example = "2024-06-12", format = "date", value_type = String)]
    pub to_date: NaiveDate,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RegularisationPayload {
    #[schema(example = "2024-06-11", format = "date", value_type = String)]
    pub date: NaiveDate,
    /// Overwritten by the server from the stored attendance row on submission.
    #[serde(default = "AttendanceState::absent")]
    pub current: AttendanceState,
    #[serde(default = "AttendanceState::present")]
    pub requested: AttendanceState,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReimbursementPayload {
    #[schema(example = "travel")]
    pub category: String,
    #[schema(example = 1250.0)]
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    /// Reference to the uploaded bill, as returned by the upload collaborator.
    #[serde(default, alias = "bill_file")]
    #[schema(example = "bill_2024_06_11.pdf")]
    pub bill: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RemunerationPayload {
    #[serde(alias = "type")]
    #[schema(example = "bonus")]
    pub remuneration_type: String,
    #[schema(example = 5000.0)]
    pub amount: f64,
    /// `YYYY-MM`
    #[schema(example = "2024-06")]
    pub month: String,
    #[serde(default)]
    pub reason: String,
}

/// Kind-specific body of an approval request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApprovalPayload {
    Leave(LeavePayload),
    Regularisation(RegularisationPayload),
    Reimbursement(ReimbursementPayload),
    Remuneration(RemunerationPayload),
}

impl ApprovalPayload {
    pub fn kind(&self) -> ApprovalKind {
        match self {
            ApprovalPayload::Leave(_) => ApprovalKind::Leave,
            ApprovalPayload::Regularisation(_) => ApprovalKind::Regularisation,
            ApprovalPayload::Reimbursement(_) => ApprovalKind::Reimbursement,
            ApprovalPayload::Remuneration(_) => ApprovalKind::Remuneration,
        }
    }

    /// Reads a raw JSON body as the shape `kind` requires.
    pub fn from_json(kind: ApprovalKind, raw: Value) -> Result<Self, AppError> {
        let invalid = |e: serde_json::Error| AppError::invalid_payload(format!("Invalid {kind} payload: {e}"));
        Ok(match kind {
            ApprovalKind::Leave => ApprovalPayload::Leave(serde_json::from_value(raw).map_err(invalid)?),
            ApprovalKind::Regularisation => {
                ApprovalPayload::Regularisation(serde_json::from_value(raw).map_err(invalid)?)
            }
            ApprovalKind::Reimbursement => {
                ApprovalPayload::Reimbursement(serde_json::from_value(raw).map_err(invalid)?)
            }
            ApprovalKind::Remuneration => {
                ApprovalPayload::Remuneration(serde_json::from_value(raw).map_err(invalid)?)
            }
        })
    }

    pub fn to_json(&self) -> Value {
        // untagged serialization of plain structs cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Raw `approvals` row, optionally joined with submitter / approver names.
#[derive(Debug, sqlx::FromRow)]
pub struct ApprovalRow {
    pub id: u64,
    pub employee_id: u64,
    #[sqlx(try_from = "String")]
    pub kind: ApprovalKind,
    pub payload: Json<Value>,
    pub assigned_to: u64,
    #[sqlx(try_from = "String")]
    pub status: ApprovalStatus,
    pub created_at: NaiveDateTime,
    pub approved_at: Option<NaiveDateTime>,
    pub approved_by: Option<u64>,
    pub rejection_reason: Option<String>,
    #[sqlx(default)]
    pub employee_name: Option<String>,
    #[sqlx(default)]
    pub approver_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApprovalRequest {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = 12)]
    pub employee_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_name: Option<String>,
    #[serde(rename = "type")]
    #[schema(example = "leave", value_type = String)]
    pub kind: ApprovalKind,
    #[schema(value_type = Object)]
    pub payload: ApprovalPayload,
    #[schema(example = 1)]
    pub assigned_to: u64,
    #[schema(example = "Pending", value_type = String)]
    pub status: ApprovalStatus,
    #[schema(example = "2024-06-09T10:15:00", value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(value_type = Option<String>)]
    pub approved_at: Option<NaiveDateTime>,
    pub approved_by: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_name: Option<String>,
    pub rejection_reason: Option<String>,
}

impl TryFrom<ApprovalRow> for ApprovalRequest {
    type Error = AppError;

    fn try_from(row: ApprovalRow) -> Result<Self, Self::Error> {
        let payload = ApprovalPayload::from_json(row.kind, row.payload.0).map_err(|e| {
            tracing::error!(approval_id = row.id, error = %e, "Stored approval payload is unreadable");
            AppError::Infrastructure(format!("corrupt payload on approval {}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            employee_id: row.employee_id,
            employee_name: row.employee_name,
            kind: row.kind,
            payload,
            assigned_to: row.assigned_to,
            status: row.status,
            created_at: row.created_at,
            approved_at: row.approved_at,
            approved_by: row.approved_by,
            approver_name: row.approver_name,
            rejection_reason: row.rejection_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_each_kind() {
        let leave = ApprovalPayload::from_json(
            ApprovalKind::Leave,
            json!({"leave_type": "sick", "from_date": "2024-06-10", "to_date": "2024-06-12", "reason": "flu"}),
        )
        .unwrap();
        assert_eq!(leave.kind(), ApprovalKind::Leave);

        let remuneration = ApprovalPayload::from_json(
            ApprovalKind::Remuneration,
            json!({"type": "bonus", "amount": 100.0, "month": "2024-06"}),
        )
        .unwrap();
        match remuneration {
            ApprovalPayload::Remuneration(p) => assert_eq!(p.remuneration_type, "bonus"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn regularisation_defaults_snapshots() {
        let p = ApprovalPayload::from_json(
            ApprovalKind::Regularisation,
            json!({"date": "2024-06-11", "requested": {"status": "Present", "check_in": "09:30"}, "reason": "forgot"}),
        )
        .unwrap();
        let ApprovalPayload::Regularisation(p) = p else { panic!("wrong kind") };
        assert_eq!(p.current, AttendanceState::absent());
        assert_eq!(p.requested.check_in.map(|t| t.to_string()), Some("09:30:00".to_string()));
    }

    #[test]
    fn wrong_shape_is_an_invalid_payload() {
        let err = ApprovalPayload::from_json(ApprovalKind::Reimbursement, json!({"category": "travel"}))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidPayload(_)));
        assert!(err.to_string().starts_with("Invalid reimbursement payload"));

        // a leave body sent as a remuneration is a shape error too
        let err = ApprovalPayload::from_json(
            ApprovalKind::Remuneration,
            json!({"leave_type": "sick", "from_date": "2024-06-10", "to_date": "2024-06-12"}),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidPayload(_)));
    }

    #[test]
    fn overridden_counts_as_approved_only_when_asked() {
        assert!(ApprovalStatus::Overridden.is_effectively_approved());
        assert_ne!(ApprovalStatus::Overridden, ApprovalStatus::Approved);
        assert!(!ApprovalStatus::Rejected.is_effectively_approved());
        assert!(!ApprovalStatus::Pending.is_terminal());
    }
}
