//! Who may change what on a task.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::model::role::Role;
use crate::model::task::{Task, TaskPriority, TaskStatus};

#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    #[schema(example = "in-progress", value_type = Option<String>)]
    pub status: Option<TaskStatus>,
    #[schema(example = "high", value_type = Option<String>)]
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<u64>,
    #[schema(example = "2024-06-14", format = "date", value_type = Option<String>)]
    pub due_date: Option<NaiveDate>,
}

/// Applies `changes` made by (`actor`, `role`) to `task`.
///
/// Employees may only touch their own tasks and only the status; other fields
/// they send are ignored. Admins may change everything.
pub fn apply_changes(
    task: &mut Task,
    changes: TaskChanges,
    actor: u64,
    role: Role,
    now: NaiveDateTime,
) -> AppResult<()> {
    let admin = role == Role::Admin;
    if !admin && task.assigned_to != actor {
        return Err(AppError::forbidden("You can only update tasks assigned to you"));
    }

    if admin {
        if let Some(title) = changes.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(AppError::validation("title cannot be empty"));
            }
            task.title = title.to_string();
        }
        if let Some(description) = changes.description {
            task.description = description;
        }
        if let Some(priority) = changes.priority {
            task.priority = priority;
        }
        if let Some(assignee) = changes.assigned_to {
            task.assigned_to = assignee;
        }
        if changes.due_date.is_some() {
            task.due_date = changes.due_date;
        }
    }

    if let Some(status) = changes.status {
        task.status = status;
        task.completed_at = match status {
            TaskStatus::Completed => task.completed_at.or(Some(now)),
            _ => None,
        };
    }

    task.updated_at = now;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn task() -> Task {
        Task {
            id: 1,
            title: "Stock count".into(),
            description: String::new(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            assigned_to: 7,
            assigned_by: 1,
            due_date: None,
            created_at: ts(9),
            updated_at: ts(9),
            completed_at: None,
            assignee_name: None,
        }
    }

    #[test]
    fn assignee_changes_status_but_not_priority() {
        let mut t = task();
        let changes = TaskChanges {
            status: Some(TaskStatus::Completed),
            priority: Some(TaskPriority::High),
            ..Default::default()
        };
        apply_changes(&mut t, changes, 7, Role::Employee, ts(12)).unwrap();

        assert_eq!(t.status, TaskStatus::Completed);
        assert_eq!(t.priority, TaskPriority::Medium);
        assert_eq!(t.completed_at, Some(ts(12)));
        assert_eq!(t.updated_at, ts(12));
    }

    #[test]
    fn other_employee_is_forbidden() {
        let mut t = task();
        let err = apply_changes(&mut t, TaskChanges::default(), 8, Role::Employee, ts(12)).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn admin_reassigns_and_reopens() {
        let mut t = task();
        t.status = TaskStatus::Completed;
        t.completed_at = Some(ts(10));

        let changes = TaskChanges {
            status: Some(TaskStatus::InProgress),
            priority: Some(TaskPriority::High),
            assigned_to: Some(9),
            ..Default::default()
        };
        apply_changes(&mut t, changes, 1, Role::Admin, ts(12)).unwrap();

        assert_eq!(t.assigned_to, 9);
        assert_eq!(t.priority, TaskPriority::High);
        assert_eq!(t.completed_at, None);
    }
}
