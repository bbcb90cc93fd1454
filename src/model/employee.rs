use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 12,
        "name": "Asha Patil",
        "email": "asha@company.com",
        "role": "employee",
        "phone": "+919812345678",
        "department": "Operations",
        "address": null,
        "bio": null,
        "blood_group": "B+",
        "is_active": true,
        "created_at": "2024-06-01T09:00:00"
    })
)]
pub struct Employee {
    #[schema(example = 12)]
    pub id: u64,

    #[schema(example = "Asha Patil")]
    pub name: String,

    #[schema(example = "asha@company.com")]
    pub email: String,

    /// only selected by the login query
    #[serde(skip)]
    #[sqlx(default)]
    pub password_hash: String,

    #[sqlx(try_from = "String")]
    #[schema(example = "employee", value_type = String)]
    pub role: Role,

    #[schema(example = "+919812345678", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = "Operations", nullable = true)]
    pub department: Option<String>,

    #[schema(nullable = true)]
    pub address: Option<String>,

    #[schema(nullable = true)]
    pub bio: Option<String>,

    #[schema(example = "B+", nullable = true)]
    pub blood_group: Option<String>,

    /// Deactivated accounts stay referenced by historical tasks and approvals.
    pub is_active: bool,

    #[schema(example = "2024-06-01T09:00:00", value_type = String)]
    pub created_at: NaiveDateTime,
}

/// Id + display fields, used for approver pickers and leaderboards.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct EmployeeSummary {
    pub id: u64,
    pub name: String,
    pub email: String,
}

/// Column list matching [`Employee`] without the password hash.
pub const EMPLOYEE_COLUMNS: &str = "id, name, email, role, phone, department, address, bio, \
                                    blood_group, is_active, created_at";
