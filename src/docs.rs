use crate::api::approval::{ApprovalAction, SubmitApproval};
use crate::api::attendance::{
    AttendanceLogEntry, CheckInRequest, CheckInResponse, CheckOutResponse, MyAttendance,
};
use crate::api::employee::{CreateEmployee, EmployeeListResponse};
use crate::api::file::ShareFile;
use crate::api::notice::{CreateNotice, CreateSuggestion, UpdateSuggestion};
use crate::api::task::CreateTask;
use crate::auth::handlers::{LoginResponse, TokenPair};
use crate::model::activity::ActivityEntry;
use crate::model::approval::{
    ApprovalRequest, ApprovalStatus, LeavePayload, RegularisationPayload, ReimbursementPayload,
    RemunerationPayload,
};
use crate::model::attendance::{AttendanceState, AttendanceStatus};
use crate::model::employee::{Employee, EmployeeSummary};
use crate::model::notice::{Notice, Suggestion};
use crate::model::shared_file::SharedFile;
use crate::model::task::{Task, TaskStatus};
use crate::models::LoginReqDto;
use crate::service::approval::{Decision, SortOrder};
use crate::service::reporting::{AttendanceSummary, DashboardCounts, LeaderboardEntry, WorkedTime};
use crate::service::tasks::TaskChanges;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRMS API",
        version = "1.0.0",
        description = r#"
## Human Resource Management System

Approval workflows and geofenced attendance for a single office.

### 🔹 Key Features
- **Attendance**
  - Geofenced check-in / check-out with late and half-day rules
  - Admin log with worked, weekly and overtime hours
- **Approvals**
  - Leave, attendance regularisation, reimbursement and remuneration requests
  - Approve / reject by the assigned admin, override by any admin
  - Regularisations rewrite the attendance record with an audit snapshot
- **Employees & Tasks**
  - Employee directory, self-service profile, task assignment and progress
- **Reports**
  - Dashboard counters and the top performer leaderboard
- **Files & Notices**
  - Shared documents, announcements, newsletters and suggestions
  - Activity feed of admin actions and task changes

### 🔐 Security
Every `/api` endpoint requires a **JWT Bearer** access token.
Refresh tokens are single use; `/auth/refresh` rotates them.

### 📦 Response Format
Errors are `{"status": "error", "message": "..."}` with a matching HTTP status.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,
        crate::api::attendance::my_attendance,
        crate::api::attendance::attendance_log,
        crate::api::attendance::audit,

        crate::api::approval::submit,
        crate::api::approval::act,
        crate::api::approval::override_approval,
        crate::api::approval::assigned_to_me,
        crate::api::approval::mine,
        crate::api::approval::leave_calendar,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::list_approvers,
        crate::api::employee::get_profile,
        crate::api::employee::update_profile,

        crate::api::task::create_task,
        crate::api::task::list_tasks,
        crate::api::task::get_task,
        crate::api::task::update_task,
        crate::api::task::delete_task,

        crate::api::report::dashboard,
        crate::api::report::top_performers_report,

        crate::api::file::share_file,
        crate::api::file::list_files,
        crate::api::file::mark_downloaded,
        crate::api::file::delete_file,

        crate::api::activity::activity_feed,
        crate::api::activity::recent_activity,
        crate::api::activity::clear_activity,

        crate::api::notice::list_announcements,
        crate::api::notice::create_announcement,
        crate::api::notice::delete_announcement,
        crate::api::notice::list_newsletters,
        crate::api::notice::create_newsletter,
        crate::api::notice::delete_newsletter,
        crate::api::notice::list_suggestions,
        crate::api::notice::create_suggestion,
        crate::api::notice::update_suggestion,
        crate::api::notice::delete_suggestion
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            TokenPair,
            CheckInRequest,
            CheckInResponse,
            CheckOutResponse,
            AttendanceLogEntry,
            MyAttendance,
            AttendanceState,
            AttendanceStatus,
            AttendanceSummary,
            WorkedTime,
            SubmitApproval,
            ApprovalAction,
            ApprovalRequest,
            ApprovalStatus,
            Decision,
            SortOrder,
            LeavePayload,
            RegularisationPayload,
            ReimbursementPayload,
            RemunerationPayload,
            CreateEmployee,
            Employee,
            EmployeeSummary,
            EmployeeListResponse,
            CreateTask,
            TaskChanges,
            Task,
            TaskStatus,
            DashboardCounts,
            LeaderboardEntry,
            ShareFile,
            SharedFile,
            CreateNotice,
            Notice,
            CreateSuggestion,
            UpdateSuggestion,
            Suggestion,
            ActivityEntry
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and token rotation"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Approvals", description = "Approval workflow APIs"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Tasks", description = "Task management APIs"),
        (name = "Reports", description = "Dashboard and leaderboard"),
        (name = "Files", description = "Shared files"),
        (name = "Notices", description = "Announcements, newsletters and suggestions"),
        (name = "Activity", description = "Who did what, newest first"),
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
    fn every_route_group_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/login",
            "/api/attendance/check-in",
            "/api/approvals/action",
            "/api/approvals/{id}/override",
            "/api/employees/approvers",
            "/api/reports/top-performers",
            "/api/files/{file_id}/download",
            "/api/suggestions/{id}",
            "/api/activity/recent",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
