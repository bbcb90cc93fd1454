//! Dashboard counters, the top-performer board and attendance roll-ups.
//!
//! Each report is a full scan of the rows it is given; nothing is kept
//! between requests.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use utoipa::ToSchema;

use crate::model::approval::{ApprovalPayload, ApprovalRequest};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, DayType};
use crate::model::employee::EmployeeSummary;
use crate::model::task::{Task, TaskStatus};
use crate::service::time_utils::{overtime_minutes, week_key, worked_minutes};

/// Leaderboard weights.
pub const SCORE_PER_COMPLETED: i64 = 3;
pub const SCORE_PER_IN_PROGRESS: i64 = 1;
pub const PENALTY_PER_OVERDUE: i64 = 2;
pub const LEADERBOARD_SIZE: usize = 5;

#[derive(Debug, Default, Clone, PartialEq, Serialize, ToSchema)]
pub struct DashboardCounts {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub overdue: usize,
    pub due_today: usize,
    pub due_this_week: usize,
}

pub fn is_overdue(task: &Task, today: NaiveDate) -> bool {
    task.status != TaskStatus::Completed && task.due_date.is_some_and(|due| due < today)
}

pub fn dashboard_counts(tasks: &[Task], today: NaiveDate) -> DashboardCounts {
    let mut counts = DashboardCounts {
        total: tasks.len(),
        ..Default::default()
    };

    for task in tasks {
        if task.status == TaskStatus::Completed {
            counts.completed += 1;
            continue;
        }
        counts.pending += 1;

        let Some(due) = task.due_date else { continue };
        if due < today {
            counts.overdue += 1;
        } else if due == today {
            counts.due_today += 1;
        } else if due - today <= Duration::days(7) {
            counts.due_this_week += 1;
        }
    }

    counts
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    pub employee_id: u64,
    pub name: String,
    pub completed: i64,
    pub in_progress: i64,
    pub overdue: i64,
    /// Raw weighted score, may be negative.
    pub raw_score: i64,
    /// `raw_score` floored at zero for display.
    pub score: i64,
}

/// Top performers by `completed*3 + in_progress*1 - overdue*2`, best first.
/// Employees with equal scores keep the order they were passed in.
pub fn top_performers(
    employees: &[EmployeeSummary],
    tasks: &[Task],
    today: NaiveDate,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    let mut board: Vec<LeaderboardEntry> = employees
        .iter()
        .map(|emp| {
            let mine = tasks.iter().filter(|t| t.assigned_to == emp.id);
            let (mut completed, mut in_progress, mut overdue) = (0, 0, 0);
            for task in mine {
                match task.status {
                    TaskStatus::Completed => completed += 1,
                    TaskStatus::InProgress => in_progress += 1,
                    TaskStatus::Pending => {}
                }
                if is_overdue(task, today) {
                    overdue += 1;
                }
            }
            let raw_score = completed * SCORE_PER_COMPLETED + in_progress * SCORE_PER_IN_PROGRESS
                - overdue * PENALTY_PER_OVERDUE;
            LeaderboardEntry {
                employee_id: emp.id,
                name: emp.name.clone(),
                completed,
                in_progress,
                overdue,
                raw_score,
                score: raw_score.max(0),
            }
        })
        .collect();

    board.sort_by(|a, b| b.raw_score.cmp(&a.raw_score));
    board.truncate(limit);
    board
}

/// Every date covered by an approved (or overridden) leave.
pub fn leave_dates(requests: &[ApprovalRequest]) -> BTreeSet<NaiveDate> {
    requests
        .iter()
        .filter(|r| r.status.is_effectively_approved())
        .filter_map(|r| match &r.payload {
            ApprovalPayload::Leave(p) => Some((p.from_date, p.to_date)),
            _ => None,
        })
        .flat_map(|(from, to)| from.iter_days().take_while(move |d| *d <= to))
        .collect()
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendanceSummary {
    pub present: usize,
    pub absent: usize,
    /// present days that were half days
    pub late: usize,
    pub total: usize,
}

pub fn attendance_summary(records: &[AttendanceRecord]) -> AttendanceSummary {
    let mut summary = AttendanceSummary {
        present: 0,
        absent: 0,
        late: 0,
        total: records.len(),
    };
    for r in records {
        if r.status == AttendanceStatus::Present {
            summary.present += 1;
            if r.day_type == DayType::Half {
                summary.late += 1;
            }
        } else {
            summary.absent += 1;
        }
    }
    summary
}

/// Per-record worked time alongside the weekly total of the record's week.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WorkedTime {
    pub worked_minutes: i64,
    pub weekly_minutes: i64,
    pub overtime_minutes: i64,
}

/// One entry per record, in input order.
pub fn worked_times(records: &[AttendanceRecord]) -> Vec<WorkedTime> {
    let mut weekly: HashMap<(u64, NaiveDate), i64> = HashMap::new();
    for r in records {
        *weekly.entry((r.employee_id, week_key(r.date))).or_default() += worked_minutes(r);
    }

    records
        .iter()
        .map(|r| WorkedTime {
            worked_minutes: worked_minutes(r),
            weekly_minutes: weekly
                .get(&(r.employee_id, week_key(r.date)))
                .copied()
                .unwrap_or_default(),
            overtime_minutes: match (r.check_in, r.check_out) {
                (Some(i), Some(o)) => overtime_minutes(i, o),
                _ => 0,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::approval::{ApprovalKind, ApprovalStatus, LeavePayload};
    use crate::model::task::TaskPriority;
    use chrono::{NaiveDateTime, NaiveTime};

    fn d(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn ts() -> NaiveDateTime {
        d("2024-06-01").and_hms_opt(9, 0, 0).unwrap()
    }

    fn task(id: u64, assigned_to: u64, status: TaskStatus, due: Option<&str>) -> Task {
        Task {
            id,
            title: format!("task {id}"),
            description: String::new(),
            status,
            priority: TaskPriority::Medium,
            assigned_to,
            assigned_by: 1,
            due_date: due.map(d),
            created_at: ts(),
            updated_at: ts(),
            completed_at: None,
            assignee_name: None,
        }
    }

    fn emp(id: u64, name: &str) -> EmployeeSummary {
        EmployeeSummary {
            id,
            name: name.into(),
            email: format!("{name}@company.com"),
        }
    }

    #[test]
    fn dashboard_buckets() {
        let today = d("2024-06-12");
        let tasks = vec![
            task(1, 2, TaskStatus::Completed, Some("2024-06-01")), // completed, never overdue
            task(2, 2, TaskStatus::Pending, Some("2024-06-11")),   // overdue
            task(3, 2, TaskStatus::InProgress, Some("2024-06-12")), // today
            task(4, 2, TaskStatus::Pending, Some("2024-06-19")),   // +7 days, this week
            task(5, 2, TaskStatus::Pending, Some("2024-06-20")),   // +8 days
            task(6, 2, TaskStatus::Pending, None),
        ];
        let c = dashboard_counts(&tasks, today);
        assert_eq!(
            c,
            DashboardCounts {
                total: 6,
                pending: 5,
                completed: 1,
                overdue: 1,
                due_today: 1,
                due_this_week: 1,
            }
        );
    }

    #[test]
    fn leaderboard_scores_and_floor() {
        let today = d("2024-06-12");
        let employees = vec![emp(2, "asha"), emp(3, "ravi"), emp(4, "meera")];
        let tasks = vec![
            task(1, 2, TaskStatus::Completed, None),
            task(2, 2, TaskStatus::InProgress, None),
            task(3, 3, TaskStatus::Pending, Some("2024-06-01")),
            task(4, 3, TaskStatus::Pending, Some("2024-06-02")),
        ];

        let board = top_performers(&employees, &tasks, today, LEADERBOARD_SIZE);
        assert_eq!(board[0].name, "asha");
        assert_eq!(board[0].raw_score, 4);
        assert_eq!(board[1].name, "meera");
        assert_eq!(board[1].score, 0);
        assert_eq!(board[2].name, "ravi");
        assert_eq!(board[2].raw_score, -4);
        assert_eq!(board[2].score, 0);
    }

    #[test]
    fn leaderboard_is_truncated() {
        let employees: Vec<_> = (1..=8).map(|i| emp(i, &format!("e{i}"))).collect();
        assert_eq!(top_performers(&employees, &[], d("2024-06-12"), 5).len(), 5);
    }

    #[test]
    fn approved_leave_marks_every_day() {
        let leave = |id, status| ApprovalRequest {
            id,
            employee_id: 5,
            employee_name: None,
            kind: ApprovalKind::Leave,
            payload: ApprovalPayload::Leave(LeavePayload {
                leave_type: "annual".into(),
                from_date: d("2024-06-10"),
                to_date: d("2024-06-12"),
                reason: String::new(),
            }),
            assigned_to: 1,
            status,
            created_at: ts(),
            approved_at: None,
            approved_by: None,
            approver_name: None,
            rejection_reason: None,
        };

        let days = leave_dates(&[leave(1, ApprovalStatus::Approved)]);
        assert_eq!(
            days.into_iter().collect::<Vec<_>>(),
            vec![d("2024-06-10"), d("2024-06-11"), d("2024-06-12")]
        );

        assert!(leave_dates(&[leave(2, ApprovalStatus::Pending), leave(3, ApprovalStatus::Rejected)]).is_empty());
    }

    #[test]
    fn worked_times_group_by_employee_week() {
        let hm = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        let rec = |emp, date, i: NaiveTime, o: NaiveTime| AttendanceRecord {
            id: 0,
            employee_id: emp,
            date: d(date),
            check_in: Some(i),
            check_out: Some(o),
            latitude: None,
            longitude: None,
            distance_m: None,
            status: AttendanceStatus::Present,
            day_type: DayType::Full,
            late_comment: None,
            regularised: false,
            audit: None,
        };
        let records = vec![
            rec(1, "2024-06-10", hm(9, 0), hm(17, 0)),
            rec(1, "2024-06-11", hm(9, 0), hm(14, 0)),
            rec(2, "2024-06-11", hm(9, 0), hm(19, 0)),
        ];
        let times = worked_times(&records);
        assert_eq!(times[0].weekly_minutes, 780);
        assert_eq!(times[1].weekly_minutes, 780);
        assert_eq!(times[2].weekly_minutes, 600);
        assert_eq!(times[2].overtime_minutes, 120);

        let summary = attendance_summary(&records);
        assert_eq!((summary.present, summary.absent, summary.total), (3, 0, 3));
    }
}
