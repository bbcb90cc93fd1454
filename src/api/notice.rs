use crate::{
    api::activity::record_detached,
    auth::auth::AuthUser,
    config::Config,
    error::{AppError, AppResult},
    model::{
        activity::Activity,
        notice::{Notice, NoticeChannel, Suggestion},
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

const SUGGESTION_STATUSES: &[&str] = &["pending", "reviewed", "implemented", "rejected"];

#[derive(Deserialize, ToSchema)]
pub struct CreateNotice {
    #[schema(example = "Office closed on Friday")]
    pub title: String,
    #[schema(example = "The office stays closed for maintenance.")]
    pub body: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateSuggestion {
    #[schema(example = "Standing desks")]
    pub title: String,
    pub description: String,
    #[schema(example = "Workplace")]
    pub category: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateSuggestion {
    #[schema(example = "reviewed")]
    pub status: String,
}

// ---------- announcements & newsletters ----------

async fn list_channel(pool: &MySqlPool, channel: NoticeChannel) -> AppResult<Vec<Notice>> {
    Ok(sqlx::query_as::<_, Notice>(
        r#"
        SELECT id, channel, title, body, created_by, created_at
        FROM notices
        WHERE channel = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(channel.as_ref())
    .fetch_all(pool)
    .await?)
}

async fn post_to_channel(
    auth: &AuthUser,
    pool: &MySqlPool,
    config: &Config,
    channel: NoticeChannel,
    payload: &CreateNotice,
) -> AppResult<Notice> {
    auth.require_admin()?;
    let title = payload.title.trim();
    if title.is_empty() || payload.body.trim().is_empty() {
        return Err(AppError::validation("title and body are required"));
    }

    let now = config.now_local();
    let result = sqlx::query("INSERT INTO notices (channel, title, body, created_by, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(channel.as_ref())
        .bind(title)
        .bind(&payload.body)
        .bind(auth.employee_id)
        .bind(now)
        .execute(pool)
        .await?;

    let id = result.last_insert_id();
    info!(notice_id = id, %channel, by = auth.employee_id, "Notice posted");
    record_detached(pool, auth.employee_id, Activity::NoticePosted { channel, title }, now).await;

    Ok(Notice {
        id,
        channel,
        title: title.to_string(),
        body: payload.body.clone(),
        created_by: auth.employee_id,
        created_at: now,
    })
}

async fn delete_from_channel(auth: &AuthUser, pool: &MySqlPool, channel: NoticeChannel, id: u64) -> AppResult<()> {
    auth.require_admin()?;
    let res = sqlx::query("DELETE FROM notices WHERE id = ? AND channel = ?")
        .bind(id)
        .bind(channel.as_ref())
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::not_found(format!("{channel} not found")));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/announcements",
    responses((status = 200, description = "Newest first", body = Vec<Notice>)),
    tag = "Notices",
    security(("bearer_auth" = []))
)]
pub async fn list_announcements(_auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(list_channel(pool.get_ref(), NoticeChannel::Announcement).await?))
}

#[utoipa::path(
    post,
    path = "/api/announcements",
    request_body = CreateNotice,
    responses(
        (status = 201, description = "Posted", body = Notice),
        (status = 403, description = "Admin only")
    ),
    tag = "Notices",
    security(("bearer_auth" = []))
)]
pub async fn create_announcement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateNotice>,
) -> AppResult<HttpResponse> {
    let notice = post_to_channel(&auth, pool.get_ref(), &config, NoticeChannel::Announcement, &payload).await?;
    Ok(HttpResponse::Created().json(notice))
}

#[utoipa::path(
    delete,
    path = "/api/announcements/{id}",
    params(("id", Path, description = "Announcement ID")),
    responses(
        (status = 200, description = "Deleted", body = Object, example = json!({"message": "Deleted"})),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found")
    ),
    tag = "Notices",
    security(("bearer_auth" = []))
)]
pub async fn delete_announcement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    delete_from_channel(&auth, pool.get_ref(), NoticeChannel::Announcement, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Deleted" })))
}

#[utoipa::path(
    get,
    path = "/api/newsletters",
    responses((status = 200, description = "Newest first", body = Vec<Notice>)),
    tag = "Notices",
    security(("bearer_auth" = []))
)]
pub async fn list_newsletters(_auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(list_channel(pool.get_ref(), NoticeChannel::Newsletter).await?))
}

#[utoipa::path(
    post,
    path = "/api/newsletters",
    request_body = CreateNotice,
    responses(
        (status = 201, description = "Posted", body = Notice),
        (status = 403, description = "Admin only")
    ),
    tag = "Notices",
    security(("bearer_auth" = []))
)]
pub async fn create_newsletter(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateNotice>,
) -> AppResult<HttpResponse> {
    let notice = post_to_channel(&auth, pool.get_ref(), &config, NoticeChannel::Newsletter, &payload).await?;
    Ok(HttpResponse::Created().json(notice))
}

#[utoipa::path(
    delete,
    path = "/api/newsletters/{id}",
    params(("id", Path, description = "Newsletter ID")),
    responses(
        (status = 200, description = "Deleted", body = Object, example = json!({"message": "Deleted"})),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found")
    ),
    tag = "Notices",
    security(("bearer_auth" = []))
)]
pub async fn delete_newsletter(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    delete_from_channel(&auth, pool.get_ref(), NoticeChannel::Newsletter, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Deleted" })))
}

// ---------- suggestions ----------

/// Suggestions: all for admins, own for employees
#[utoipa::path(
    get,
    path = "/api/suggestions",
    responses((status = 200, description = "Newest first", body = Vec<Suggestion>)),
    tag = "Notices",
    security(("bearer_auth" = []))
)]
pub async fn list_suggestions(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let base = r#"
        SELECT s.id, s.title, s.description, s.category, s.status, s.submitted_by,
               e.name AS submitter_name, s.created_at
        FROM suggestions s
        LEFT JOIN employees e ON e.id = s.submitted_by
    "#;

    let suggestions = if auth.is_admin() {
        sqlx::query_as::<_, Suggestion>(&format!("{base} ORDER BY s.created_at DESC, s.id DESC"))
            .fetch_all(pool.get_ref())
            .await?
    } else {
        sqlx::query_as::<_, Suggestion>(&format!(
            "{base} WHERE s.submitted_by = ? ORDER BY s.created_at DESC, s.id DESC"
        ))
        .bind(auth.employee_id)
        .fetch_all(pool.get_ref())
        .await?
    };

    Ok(HttpResponse::Ok().json(suggestions))
}

#[utoipa::path(
    post,
    path = "/api/suggestions",
    request_body = CreateSuggestion,
    responses(
        (status = 201, description = "Submitted", body = Object, example = json!({"message": "Suggestion submitted", "id": 9})),
        (status = 400, description = "Missing title or description")
    ),
    tag = "Notices",
    security(("bearer_auth" = []))
)]
pub async fn create_suggestion(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateSuggestion>,
) -> AppResult<HttpResponse> {
    let title = payload.title.trim();
    if title.is_empty() || payload.description.trim().is_empty() {
        return Err(AppError::validation("title and description are required"));
    }
    let category = payload
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("General");

    let result = sqlx::query(
        r#"
        INSERT INTO suggestions (title, description, category, status, submitted_by, created_at)
        VALUES (?, ?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(title)
    .bind(&payload.description)
    .bind(category)
    .bind(auth.employee_id)
    .bind(config.now_local())
    .execute(pool.get_ref())
    .await?;

    let id = result.last_insert_id();
    Ok(HttpResponse::Created().json(json!({ "message": "Suggestion submitted", "id": id })))
}

#[utoipa::path(
    put,
    path = "/api/suggestions/{id}",
    params(("id", Path, description = "Suggestion ID")),
    request_body = UpdateSuggestion,
    responses(
        (status = 200, description = "Status updated", body = Object, example = json!({"message": "Suggestion updated"})),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found")
    ),
    tag = "Notices",
    security(("bearer_auth" = []))
)]
pub async fn update_suggestion(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateSuggestion>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let status = payload.status.trim().to_lowercase();
    if !SUGGESTION_STATUSES.contains(&status.as_str()) {
        return Err(AppError::validation(format!(
            "status must be one of {}",
            SUGGESTION_STATUSES.join(", ")
        )));
    }

    let id = path.into_inner();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM suggestions WHERE id = ?")
        .bind(id)
        .fetch_one(pool.get_ref())
        .await?;
    if count == 0 {
        return Err(AppError::not_found("Suggestion not found"));
    }

    sqlx::query("UPDATE suggestions SET status = ? WHERE id = ?")
        .bind(&status)
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Suggestion updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/suggestions/{id}",
    params(("id", Path, description = "Suggestion ID")),
    responses(
        (status = 200, description = "Deleted", body = Object, example = json!({"message": "Deleted"})),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found")
    ),
    tag = "Notices",
    security(("bearer_auth" = []))
)]
pub async fn delete_suggestion(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let res = sqlx::query("DELETE FROM suggestions WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Suggestion not found"));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Deleted" })))
}
