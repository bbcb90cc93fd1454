use crate::{
    api::task::{TaskFilter, visible_tasks},
    auth::auth::AuthUser,
    config::Config,
    error::AppResult,
    model::{employee::EmployeeSummary, task::Task},
    service::reporting::{DashboardCounts, LEADERBOARD_SIZE, LeaderboardEntry, dashboard_counts, top_performers},
};
use actix_web::{HttpResponse, web};
use sqlx::MySqlPool;

/// Task counters for the caller's dashboard (all tasks for admins)
#[utoipa::path(
    get,
    path = "/api/reports/dashboard",
    responses((status = 200, description = "Counters", body = DashboardCounts)),
    tag = "Reports",
    security(("bearer_auth" = []))
)]
pub async fn dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let filter = TaskFilter {
        status: None,
        assigned_to: None,
    };
    let tasks = visible_tasks(pool.get_ref(), &auth, &filter).await?;
    let counts = dashboard_counts(&tasks, config.now_local().date());
    Ok(HttpResponse::Ok().json(counts))
}

/// Leaderboard over active employees
#[utoipa::path(
    get,
    path = "/api/reports/top-performers",
    responses((status = 200, description = "Best first, at most five", body = Vec<LeaderboardEntry>)),
    tag = "Reports",
    security(("bearer_auth" = []))
)]
pub async fn top_performers_report(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let employees = sqlx::query_as::<_, EmployeeSummary>(
        "SELECT id, name, email FROM employees WHERE is_active = TRUE AND role = 'employee' ORDER BY id",
    )
    .fetch_all(pool.get_ref())
    .await?;

    let tasks = sqlx::query_as::<_, Task>(
        r#"
        SELECT id, title, description, status, priority, assigned_to, assigned_by,
               due_date, created_at, updated_at, completed_at
        FROM tasks
        "#,
    )
    .fetch_all(pool.get_ref())
    .await?;

    let board = top_performers(&employees, &tasks, config.now_local().date(), LEADERBOARD_SIZE);
    Ok(HttpResponse::Ok().json(board))
}
