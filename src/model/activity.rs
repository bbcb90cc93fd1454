use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::approval::{ApprovalKind, ApprovalStatus};
use crate::model::notice::NoticeChannel;
use crate::model::task::TaskStatus;

/// Rows returned by the admin feed when no limit is given, and its ceiling.
pub const FEED_LIMIT: i64 = 200;
/// Rows in the "recent activity" widgets.
pub const RECENT_LIMIT: i64 = 5;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct ActivityEntry {
    #[schema(example = 118)]
    pub id: u64,
    #[schema(example = 1)]
    pub actor_id: u64,
    #[sqlx(default)]
    #[schema(example = "Admin")]
    pub actor_name: Option<String>,
    #[schema(example = "Created task 'Prepare Q2 stock report'")]
    pub action: String,
    pub task_id: Option<u64>,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
}

/// One line of the activity feed, before it is written.
#[derive(Debug, Clone, PartialEq)]
pub enum Activity<'a> {
    EmployeeAdded { name: &'a str },
    EmployeeDeactivated { id: u64 },
    TaskCreated { id: u64, title: &'a str },
    TaskUpdated { id: u64, title: &'a str, status: TaskStatus },
    TaskDeleted { id: u64 },
    ApprovalResolved {
        status: ApprovalStatus,
        kind: ApprovalKind,
        employee: Option<&'a str>,
    },
    FileShared { filename: &'a str },
    NoticePosted { channel: NoticeChannel, title: &'a str },
}

impl Activity<'_> {
    /// Task the entry belongs to, so assignees see it in their feed.
    pub fn task_id(&self) -> Option<u64> {
        match self {
            Activity::TaskCreated { id, .. } | Activity::TaskUpdated { id, .. } | Activity::TaskDeleted { id } => {
                Some(*id)
            }
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Activity::EmployeeAdded { name } => format!("Added employee '{name}'"),
            Activity::EmployeeDeactivated { id } => format!("Deactivated employee {id}"),
            Activity::TaskCreated { title, .. } => format!("Created task '{title}'"),
            Activity::TaskUpdated { title, status, .. } => format!("Updated task '{title}' ({status})"),
            Activity::TaskDeleted { id } => format!("Deleted task {id}"),
            Activity::ApprovalResolved { status, kind, employee } => {
                format!("{status} {}'s {kind} request", employee.unwrap_or("an employee"))
            }
            Activity::FileShared { filename } => format!("Shared file '{filename}'"),
            Activity::NoticePosted { channel, title } => format!("Posted {channel} '{title}'"),
        }
    }
}

/// Clamps a requested page size to `1..=FEED_LIMIT`.
pub fn feed_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(FEED_LIMIT).clamp(1, FEED_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_entries_carry_their_task() {
        assert_eq!(Activity::TaskCreated { id: 4, title: "Stock" }.task_id(), Some(4));
        assert_eq!(Activity::TaskDeleted { id: 9 }.task_id(), Some(9));
        assert_eq!(Activity::FileShared { filename: "kra.pdf" }.task_id(), None);
    }

    #[test]
    fn descriptions_read_like_the_feed() {
        let resolved = Activity::ApprovalResolved {
            status: ApprovalStatus::Rejected,
            kind: ApprovalKind::Leave,
            employee: Some("Asha Patil"),
        };
        assert_eq!(resolved.describe(), "Rejected Asha Patil's leave request");

        let updated = Activity::TaskUpdated {
            id: 3,
            title: "Stock",
            status: TaskStatus::InProgress,
        };
        assert_eq!(updated.describe(), "Updated task 'Stock' (In Progress)");

        let posted = Activity::NoticePosted {
            channel: NoticeChannel::Newsletter,
            title: "June",
        };
        assert_eq!(posted.describe(), "Posted newsletter 'June'");
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(feed_limit(None), FEED_LIMIT);
        assert_eq!(feed_limit(Some(5)), 5);
        assert_eq!(feed_limit(Some(0)), 1);
        assert_eq!(feed_limit(Some(-3)), 1);
        assert_eq!(feed_limit(Some(10_000)), FEED_LIMIT);
    }
}
