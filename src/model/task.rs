use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Stored as `Pending`, `In Progress`, `Completed`; the lowercase spellings used
/// by the task-board client are accepted on input.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
pub enum TaskStatus {
    #[serde(alias = "to-do", alias = "pending")]
    #[strum(to_string = "Pending", serialize = "to-do", serialize = "pending")]
    Pending,
    #[serde(rename = "In Progress", alias = "in-progress")]
    #[strum(to_string = "In Progress", serialize = "in-progress")]
    InProgress,
    #[serde(alias = "completed")]
    #[strum(to_string = "Completed", serialize = "completed")]
    Completed,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, Display, EnumString, AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Task {
    #[schema(example = 41)]
    pub id: u64,
    #[schema(example = "Prepare Q2 stock report")]
    pub title: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    #[schema(example = "In Progress", value_type = String)]
    pub status: TaskStatus,
    #[sqlx(try_from = "String")]
    #[schema(example = "medium", value_type = String)]
    pub priority: TaskPriority,
    pub assigned_to: u64,
    pub assigned_by: u64,
    #[schema(example = "2024-06-14", format = "date", value_type = Option<String>)]
    pub due_date: Option<NaiveDate>,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(value_type = String)]
    pub updated_at: NaiveDateTime,
    #[schema(value_type = Option<String>)]
    pub completed_at: Option<NaiveDateTime>,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_client_spellings() {
        assert_eq!("to-do".parse::<TaskStatus>().unwrap(), TaskStatus::Pending);
        assert_eq!("in-progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("In Progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!(TaskStatus::InProgress.as_ref(), "In Progress");

        let s: TaskStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(s, TaskStatus::Completed);
        assert_eq!(serde_json::to_string(&TaskStatus::InProgress).unwrap(), "\"In Progress\"");
    }
}
