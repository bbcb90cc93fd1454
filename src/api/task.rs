use crate::{
    api::activity::record_detached,
    auth::auth::AuthUser,
    config::Config,
    error::{AppError, AppResult},
    model::{
        activity::Activity,
        task::{Task, TaskPriority, TaskStatus},
    },
    service::tasks::{TaskChanges, apply_changes},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const TASK_SELECT: &str = r#"
    SELECT t.id, t.title, t.description, t.status, t.priority, t.assigned_to, t.assigned_by,
           t.due_date, t.created_at, t.updated_at, t.completed_at, e.name AS assignee_name
    FROM tasks t
    LEFT JOIN employees e ON e.id = t.assigned_to
"#;

#[derive(Deserialize, ToSchema)]
pub struct CreateTask {
    #[schema(example = "Prepare Q2 stock report")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    #[schema(example = "high", value_type = String)]
    pub priority: TaskPriority,
    #[schema(example = 12)]
    pub assigned_to: u64,
    #[schema(example = "2024-06-14", format = "date", value_type = Option<String>)]
    pub due_date: Option<NaiveDate>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TaskFilter {
    #[param(example = "In Progress", value_type = Option<String>)]
    pub status: Option<TaskStatus>,
    /// Admin only; employees always see their own tasks
    pub assigned_to: Option<u64>,
}

/// Every task visible to the caller, newest first.
pub async fn visible_tasks(pool: &MySqlPool, auth: &AuthUser, filter: &TaskFilter) -> AppResult<Vec<Task>> {
    let mut qb: QueryBuilder<MySql> = QueryBuilder::new(TASK_SELECT);
    qb.push(" WHERE 1 = 1");

    let assignee = if auth.is_admin() {
        filter.assigned_to
    } else {
        Some(auth.employee_id)
    };
    if let Some(assignee) = assignee {
        qb.push(" AND t.assigned_to = ").push_bind(assignee);
    }
    if let Some(status) = filter.status {
        qb.push(" AND t.status = ").push_bind(status.to_string());
    }
    qb.push(" ORDER BY t.created_at DESC, t.id DESC");

    Ok(qb.build_query_as::<Task>().fetch_all(pool).await?)
}

async fn find_task(pool: &MySqlPool, id: u64) -> AppResult<Task> {
    sqlx::query_as::<_, Task>(&format!("{TASK_SELECT} WHERE t.id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Task not found"))
}

async fn require_active_employee(pool: &MySqlPool, id: u64) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees WHERE id = ? AND is_active = TRUE")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if count == 0 {
        return Err(AppError::validation("assigned_to must be an active employee"));
    }
    Ok(())
}

/// Create Task (admin)
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTask,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Missing title or unknown assignee"),
        (status = 403, description = "Admin only")
    ),
    tag = "Tasks",
    security(("bearer_auth" = []))
)]
pub async fn create_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateTask>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title is required"));
    }
    require_active_employee(pool.get_ref(), payload.assigned_to).await?;

    let now = config.now_local();
    let result = sqlx::query(
        r#"
        INSERT INTO tasks
        (title, description, status, priority, assigned_to, assigned_by, due_date, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(title)
    .bind(&payload.description)
    .bind(TaskStatus::Pending.as_ref())
    .bind(payload.priority.as_ref())
    .bind(payload.assigned_to)
    .bind(auth.employee_id)
    .bind(payload.due_date)
    .bind(now)
    .bind(now)
    .execute(pool.get_ref())
    .await?;

    let id = result.last_insert_id();
    info!(task_id = id, assigned_to = payload.assigned_to, "Task created");
    record_detached(pool.get_ref(), auth.employee_id, Activity::TaskCreated { id, title }, now).await;

    Ok(HttpResponse::Created().json(find_task(pool.get_ref(), id).await?))
}

/// List Tasks
#[utoipa::path(
    get,
    path = "/api/tasks",
    params(TaskFilter),
    responses((status = 200, description = "Tasks visible to the caller", body = Vec<Task>)),
    tag = "Tasks",
    security(("bearer_auth" = []))
)]
pub async fn list_tasks(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<TaskFilter>,
) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(visible_tasks(pool.get_ref(), &auth, &query).await?))
}

/// Get Task
#[utoipa::path(
    get,
    path = "/api/tasks/{task_id}",
    params(("task_id", Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task", body = Task),
        (status = 403, description = "Not your task"),
        (status = 404, description = "Task not found")
    ),
    tag = "Tasks",
    security(("bearer_auth" = []))
)]
pub async fn get_task(auth: AuthUser, pool: web::Data<MySqlPool>, path: web::Path<u64>) -> AppResult<HttpResponse> {
    let task = find_task(pool.get_ref(), path.into_inner()).await?;
    if !auth.is_admin() && task.assigned_to != auth.employee_id {
        return Err(AppError::forbidden("You can only view tasks assigned to you"));
    }
    Ok(HttpResponse::Ok().json(task))
}

/// Update Task. Employees may change the status of their own tasks; admins anything.
#[utoipa::path(
    put,
    path = "/api/tasks/{task_id}",
    params(("task_id", Path, description = "Task ID")),
    request_body = TaskChanges,
    responses(
        (status = 200, description = "Updated task", body = Task),
        (status = 403, description = "Not your task"),
        (status = 404, description = "Task not found")
    ),
    tag = "Tasks",
    security(("bearer_auth" = []))
)]
pub async fn update_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: web::Json<TaskChanges>,
) -> AppResult<HttpResponse> {
    let mut task = find_task(pool.get_ref(), path.into_inner()).await?;
    let changes = payload.into_inner();

    if let Some(assignee) = changes.assigned_to.filter(|_| auth.is_admin()) {
        require_active_employee(pool.get_ref(), assignee).await?;
    }

    apply_changes(&mut task, changes, auth.employee_id, auth.role, config.now_local())?;

    sqlx::query(
        r#"
        UPDATE tasks
        SET title = ?, description = ?, status = ?, priority = ?, assigned_to = ?,
            due_date = ?, updated_at = ?, completed_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status.as_ref())
    .bind(task.priority.as_ref())
    .bind(task.assigned_to)
    .bind(task.due_date)
    .bind(task.updated_at)
    .bind(task.completed_at)
    .bind(task.id)
    .execute(pool.get_ref())
    .await?;

    info!(task_id = task.id, status = %task.status, by = auth.employee_id, "Task updated");
    let activity = Activity::TaskUpdated {
        id: task.id,
        title: &task.title,
        status: task.status,
    };
    record_detached(pool.get_ref(), auth.employee_id, activity, task.updated_at).await;
    Ok(HttpResponse::Ok().json(find_task(pool.get_ref(), task.id).await?))
}

/// Delete Task (admin)
#[utoipa::path(
    delete,
    path = "/api/tasks/{task_id}",
    params(("task_id", Path, description = "Task ID")),
    responses(
        (status = 200, description = "Deleted", body = Object, example = json!({"message": "Task deleted"})),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Task not found")
    ),
    tag = "Tasks",
    security(("bearer_auth" = []))
)]
pub async fn delete_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();
    let res = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Task not found"));
    }
    record_detached(pool.get_ref(), auth.employee_id, Activity::TaskDeleted { id }, config.now_local()).await;
    Ok(HttpResponse::Ok().json(json!({ "message": "Task deleted" })))
}
