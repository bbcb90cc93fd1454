use crate::{
    api::activity::record_detached,
    auth::auth::AuthUser,
    config::Config,
    error::{AppError, AppResult},
    model::{
        activity::Activity,
        shared_file::{ShareTarget, SharedFile},
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

const FILE_COLUMNS: &str =
    "id, filename, file_url, description, file_type, shared_with, shared_by, uploaded_at, downloaded_at";

/// Metadata of a file already stored by the upload collaborator.
#[derive(Deserialize, ToSchema)]
pub struct ShareFile {
    #[schema(example = "kra_2024_q2.pdf")]
    pub filename: String,
    #[schema(example = "/uploads/kra_2024_q2.pdf")]
    pub file_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_file_type")]
    #[schema(example = "KRA")]
    pub file_type: String,
    /// Employee id or `"all"`
    #[schema(example = "all", value_type = String)]
    pub shared_with: ShareTarget,
}

fn default_file_type() -> String {
    "general".to_string()
}

async fn find_file(pool: &MySqlPool, id: u64) -> AppResult<SharedFile> {
    sqlx::query_as::<_, SharedFile>(&format!("SELECT {FILE_COLUMNS} FROM shared_files WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("File not found"))
}

/// Share a file (admin)
#[utoipa::path(
    post,
    path = "/api/files",
    request_body = ShareFile,
    responses(
        (status = 201, description = "Shared", body = SharedFile),
        (status = 400, description = "Missing filename / url or unknown recipient"),
        (status = 403, description = "Admin only")
    ),
    tag = "Files",
    security(("bearer_auth" = []))
)]
pub async fn share_file(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<ShareFile>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    if payload.filename.trim().is_empty() || payload.file_url.trim().is_empty() {
        return Err(AppError::validation("filename and file_url are required"));
    }

    if let ShareTarget::Employee(id) = payload.shared_with {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees WHERE id = ? AND is_active = TRUE")
            .bind(id)
            .fetch_one(pool.get_ref())
            .await?;
        if count == 0 {
            return Err(AppError::validation("shared_with must be an active employee or \"all\""));
        }
    }

    let now = config.now_local();
    let result = sqlx::query(
        r#"
        INSERT INTO shared_files (filename, file_url, description, file_type, shared_with, shared_by, uploaded_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.filename.trim())
    .bind(payload.file_url.trim())
    .bind(&payload.description)
    .bind(&payload.file_type)
    .bind(payload.shared_with.to_string())
    .bind(auth.employee_id)
    .bind(now)
    .execute(pool.get_ref())
    .await?;

    let id = result.last_insert_id();
    info!(file_id = id, shared_with = %payload.shared_with, by = auth.employee_id, "File shared");
    let activity = Activity::FileShared {
        filename: payload.filename.trim(),
    };
    record_detached(pool.get_ref(), auth.employee_id, activity, now).await;
    Ok(HttpResponse::Created().json(find_file(pool.get_ref(), id).await?))
}

/// Files visible to the caller
#[utoipa::path(
    get,
    path = "/api/files",
    responses((status = 200, description = "Newest first", body = Vec<SharedFile>)),
    tag = "Files",
    security(("bearer_auth" = []))
)]
pub async fn list_files(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let files: Vec<SharedFile> = sqlx::query_as::<_, SharedFile>(&format!(
        "SELECT {FILE_COLUMNS} FROM shared_files ORDER BY uploaded_at DESC, id DESC"
    ))
    .fetch_all(pool.get_ref())
    .await?
    .into_iter()
    .filter(|f| f.visible_to(auth.employee_id, auth.role))
    .collect();

    Ok(HttpResponse::Ok().json(files))
}

/// Record that the caller downloaded a file
#[utoipa::path(
    put,
    path = "/api/files/{file_id}/download",
    params(("file_id", Path, description = "File ID")),
    responses(
        (status = 200, description = "File with downloaded_at set", body = SharedFile),
        (status = 404, description = "File not found or not shared with the caller")
    ),
    tag = "Files",
    security(("bearer_auth" = []))
)]
pub async fn mark_downloaded(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let file = find_file(pool.get_ref(), path.into_inner()).await?;
    if !file.visible_to(auth.employee_id, auth.role) {
        return Err(AppError::not_found("File not found"));
    }

    sqlx::query("UPDATE shared_files SET downloaded_at = ? WHERE id = ?")
        .bind(config.now_local())
        .bind(file.id)
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(find_file(pool.get_ref(), file.id).await?))
}

/// Withdraw a shared file (sharer or admin)
#[utoipa::path(
    delete,
    path = "/api/files/{file_id}",
    params(("file_id", Path, description = "File ID")),
    responses(
        (status = 200, description = "Removed", body = Object, example = json!({"message": "File removed"})),
        (status = 403, description = "Only the sharer or an admin"),
        (status = 404, description = "File not found")
    ),
    tag = "Files",
    security(("bearer_auth" = []))
)]
pub async fn delete_file(auth: AuthUser, pool: web::Data<MySqlPool>, path: web::Path<u64>) -> AppResult<HttpResponse> {
    let file = find_file(pool.get_ref(), path.into_inner()).await?;
    if !file.removable_by(auth.employee_id, auth.role) {
        return Err(AppError::forbidden("Only the sharer or an admin can remove this file"));
    }

    sqlx::query("DELETE FROM shared_files WHERE id = ?")
        .bind(file.id)
        .execute(pool.get_ref())
        .await?;

    info!(file_id = file.id, by = auth.employee_id, "File removed");
    Ok(HttpResponse::Ok().json(json!({ "message": "File removed" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_access_token;
    use crate::config::tests::{lazy_pool, test_config};
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, test};

    #[actix_web::test]
    async fn employees_cannot_share_files() {
        let config = test_config();
        let token =
            generate_access_token(7, "meera@company.com", Role::Employee, &config.jwt_secret, 60).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .app_data(web::Data::new(lazy_pool()))
                .route("/api/files", web::post().to(share_file)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/files")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({
                "filename": "kra.pdf",
                "file_url": "/uploads/kra.pdf",
                "shared_with": "all"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");
    }
}
