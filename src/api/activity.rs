use crate::{
    auth::auth::AuthUser,
    error::AppResult,
    model::activity::{Activity, ActivityEntry, RECENT_LIMIT, feed_limit},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::json;
use sqlx::{Executor, MySql, MySqlPool};
use tracing::{info, warn};
use utoipa::IntoParams;

const ACTIVITY_SELECT: &str = r#"
    SELECT a.id, a.actor_id, e.name AS actor_name, a.action, a.task_id, a.created_at
    FROM activity_log a
    LEFT JOIN employees e ON e.id = a.actor_id
"#;

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityQuery {
    /// 1 to 200, defaults to 200
    #[param(example = 5)]
    pub limit: Option<i64>,
}

/// Appends one entry. Takes any executor so approval decisions can log
/// inside their transaction.
pub async fn record<'c, E>(executor: E, actor_id: u64, activity: &Activity<'_>, at: NaiveDateTime) -> AppResult<()>
where
    E: Executor<'c, Database = MySql>,
{
    sqlx::query("INSERT INTO activity_log (actor_id, action, task_id, created_at) VALUES (?, ?, ?, ?)")
        .bind(actor_id)
        .bind(activity.describe())
        .bind(activity.task_id())
        .bind(at)
        .execute(executor)
        .await?;
    Ok(())
}

/// Logs after the main write has already succeeded; a failed feed entry
/// must not turn that write into an error response.
pub async fn record_detached(pool: &MySqlPool, actor_id: u64, activity: Activity<'_>, at: NaiveDateTime) {
    if let Err(e) = record(pool, actor_id, &activity, at).await {
        warn!(error = %e, actor_id, action = %activity.describe(), "Activity entry not written");
    }
}

/// Activity feed (admin)
#[utoipa::path(
    get,
    path = "/api/activity",
    params(ActivityQuery),
    responses(
        (status = 200, description = "Newest first", body = Vec<ActivityEntry>),
        (status = 403, description = "Admin only")
    ),
    tag = "Activity",
    security(("bearer_auth" = []))
)]
pub async fn activity_feed(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ActivityQuery>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let entries = sqlx::query_as::<_, ActivityEntry>(&format!(
        "{ACTIVITY_SELECT} ORDER BY a.created_at DESC, a.id DESC LIMIT ?"
    ))
    .bind(feed_limit(query.limit))
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(entries))
}

/// Latest entries relevant to the caller: everything for admins; admin
/// actions and entries on their own tasks for employees.
#[utoipa::path(
    get,
    path = "/api/activity/recent",
    responses((status = 200, description = "At most five, newest first", body = Vec<ActivityEntry>)),
    tag = "Activity",
    security(("bearer_auth" = []))
)]
pub async fn recent_activity(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let entries = if auth.is_admin() {
        sqlx::query_as::<_, ActivityEntry>(&format!(
            "{ACTIVITY_SELECT} ORDER BY a.created_at DESC, a.id DESC LIMIT ?"
        ))
        .bind(RECENT_LIMIT)
        .fetch_all(pool.get_ref())
        .await?
    } else {
        sqlx::query_as::<_, ActivityEntry>(&format!(
            r#"{ACTIVITY_SELECT}
            WHERE a.task_id IN (SELECT id FROM tasks WHERE assigned_to = ?)
               OR e.role = 'admin'
            ORDER BY a.created_at DESC, a.id DESC
            LIMIT ?"#
        ))
        .bind(auth.employee_id)
        .bind(RECENT_LIMIT)
        .fetch_all(pool.get_ref())
        .await?
    };

    Ok(HttpResponse::Ok().json(entries))
}

/// Empty the activity feed (admin)
#[utoipa::path(
    delete,
    path = "/api/activity",
    responses(
        (status = 200, description = "Cleared", body = Object, example = json!({"message": "Activity log cleared", "removed": 42})),
        (status = 403, description = "Admin only")
    ),
    tag = "Activity",
    security(("bearer_auth" = []))
)]
pub async fn clear_activity(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let removed = sqlx::query("DELETE FROM activity_log")
        .execute(pool.get_ref())
        .await?
        .rows_affected();

    info!(removed, by = auth.employee_id, "Activity log cleared");
    Ok(HttpResponse::Ok().json(json!({ "message": "Activity log cleared", "removed": removed })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_access_token;
    use crate::config::tests::{lazy_pool, test_config};
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, test};

    #[actix_web::test]
    async fn feed_and_clear_are_admin_only() {
        let config = test_config();
        let token =
            generate_access_token(7, "meera@company.com", Role::Employee, &config.jwt_secret, 60).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .app_data(web::Data::new(lazy_pool()))
                .service(
                    web::resource("/api/activity")
                        .route(web::get().to(activity_feed))
                        .route(web::delete().to(clear_activity)),
                ),
        )
        .await;

        for req in [test::TestRequest::get(), test::TestRequest::delete()] {
            let req = req
                .uri("/api/activity")
                .insert_header(("Authorization", format!("Bearer {token}")))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        }
    }
}
