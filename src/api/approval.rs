use crate::{
    api::activity,
    auth::auth::AuthUser,
    config::Config,
    error::{AppError, AppResult},
    model::{
        activity::Activity,
        approval::{ApprovalKind, ApprovalPayload, ApprovalRequest, ApprovalRow, ApprovalStatus, RegularisationPayload},
        attendance::{ATTENDANCE_COLUMNS, AttendanceRecord},
    },
    service::approval::{
        Decision, Resolution, SortOrder, capture_regularisation, decide, override_request, regularise,
        sort_requests, validate_submission,
    },
    utils::key_lock::KeyLocks,
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::{MySql, MySqlConnection, MySqlPool, QueryBuilder, types::Json};
use tracing::{debug, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

const APPROVAL_SELECT: &str = r#"
    SELECT a.id, a.employee_id, a.kind, a.payload, a.assigned_to, a.status, a.created_at,
           a.approved_at, a.approved_by, a.rejection_reason,
           e.name AS employee_name, ap.name AS approver_name
    FROM approvals a
    JOIN employees e ON e.id = a.employee_id
    LEFT JOIN employees ap ON ap.id = a.assigned_to
"#;

#[derive(Deserialize, ToSchema)]
#[schema(example = json!({
    "type": "leave",
    "payload": {"leave_type": "sick", "from_date": "2024-06-10", "to_date": "2024-06-12", "reason": "Fever"},
    "assigned_to": 1
}))]
pub struct SubmitApproval {
    #[serde(rename = "type")]
    #[schema(example = "leave", value_type = String)]
    pub kind: ApprovalKind,
    /// Shape depends on `type`
    #[schema(value_type = Object)]
    pub payload: Value,
    /// Approver; must be an active admin
    #[schema(example = 1)]
    pub assigned_to: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct ApprovalAction {
    #[schema(example = 7)]
    pub approval_id: u64,
    #[schema(example = "reject", value_type = String)]
    pub action: Decision,
    /// Required when rejecting
    #[schema(example = "insufficient notice")]
    pub reason: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ApprovalFilter {
    #[param(example = "Pending", value_type = Option<String>)]
    pub status: Option<ApprovalStatus>,
    #[serde(rename = "type")]
    #[param(rename = "type", example = "leave", value_type = Option<String>)]
    pub kind: Option<ApprovalKind>,
    /// `desc` (default) or `asc` on created_at
    #[param(value_type = Option<String>)]
    pub order: Option<SortOrder>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CalendarQuery {
    /// Admins may look at any employee; defaults to the caller
    pub employee_id: Option<u64>,
}

enum Audience {
    Approver(u64),
    Submitter(u64),
}

async fn fetch_requests(pool: &MySqlPool, audience: Audience, filter: &ApprovalFilter) -> AppResult<Vec<ApprovalRequest>> {
    let mut qb: QueryBuilder<MySql> = QueryBuilder::new(APPROVAL_SELECT);
    match audience {
        Audience::Approver(id) => qb.push(" WHERE a.assigned_to = ").push_bind(id),
        Audience::Submitter(id) => qb.push(" WHERE a.employee_id = ").push_bind(id),
    };
    if let Some(status) = filter.status {
        qb.push(" AND a.status = ").push_bind(status.to_string());
    }
    if let Some(kind) = filter.kind {
        qb.push(" AND a.kind = ").push_bind(kind.to_string());
    }

    let rows = qb.build_query_as::<ApprovalRow>().fetch_all(pool).await?;
    let mut requests = rows
        .into_iter()
        .map(ApprovalRequest::try_from)
        .collect::<AppResult<Vec<_>>>()?;

    sort_requests(&mut requests, filter.order.unwrap_or_default());
    Ok(requests)
}

async fn fetch_request(conn: &mut MySqlConnection, id: u64) -> AppResult<ApprovalRequest> {
    let row = sqlx::query_as::<_, ApprovalRow>(&format!("{APPROVAL_SELECT} WHERE a.id = ? FOR UPDATE"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Approval {id} not found")))?;
    ApprovalRequest::try_from(row)
}

/// Writes a terminal transition; fails if another writer got there first.
async fn persist_resolution(conn: &mut MySqlConnection, id: u64, resolution: &Resolution) -> AppResult<()> {
    let updated = sqlx::query(
        r#"
        UPDATE approvals
        SET status = ?, approved_by = ?, approved_at = ?, rejection_reason = ?
        WHERE id = ? AND status = 'Pending'
        "#,
    )
    .bind(resolution.status.as_ref())
    .bind(resolution.decided_by)
    .bind(resolution.decided_at)
    .bind(&resolution.rejection_reason)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::conflict(format!("Approval {id} already decided")));
    }
    Ok(())
}

/// Forces the regularised day to Present and stores the before/after audit.
async fn apply_regularisation(
    conn: &mut MySqlConnection,
    employee_id: u64,
    payload: &RegularisationPayload,
    approver: u64,
    approved_at: NaiveDateTime,
) -> AppResult<()> {
    let existing = sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date = ? FOR UPDATE"
    ))
    .bind(employee_id)
    .bind(payload.date)
    .fetch_optional(&mut *conn)
    .await?;

    let day = regularise(payload, existing.as_ref(), approver, approved_at);

    match existing {
        Some(row) => {
            sqlx::query(
                r#"
                UPDATE attendance
                SET status = ?, check_in = ?, check_out = ?, regularised = TRUE, audit = ?
                WHERE id = ?
                "#,
            )
            .bind(day.after.status.as_ref())
            .bind(day.after.check_in)
            .bind(day.after.check_out)
            .bind(Json(&day.audit))
            .bind(row.id)
            .execute(&mut *conn)
            .await?;
        }
        None => {
            sqlx::query(
                r#"
                INSERT INTO attendance
                (employee_id, date, check_in, check_out, status, day_type, regularised, audit)
                VALUES (?, ?, ?, ?, ?, 'FULL', TRUE, ?)
                "#,
            )
            .bind(employee_id)
            .bind(payload.date)
            .bind(day.after.check_in)
            .bind(day.after.check_out)
            .bind(day.after.status.as_ref())
            .bind(Json(&day.audit))
            .execute(&mut *conn)
            .await?;
        }
    }

    info!(employee_id, date = %payload.date, approver, "Attendance regularised");
    Ok(())
}

/// Loads, transitions and persists one request under its lock. Regularisation
/// side effects share the transaction with the status change.
async fn resolve<F>(
    pool: &MySqlPool,
    locks: &KeyLocks,
    approval_id: u64,
    transition: F,
) -> AppResult<ApprovalRequest>
where
    F: FnOnce(&ApprovalRequest) -> AppResult<Resolution>,
{
    let _approval_guard = locks.acquire(&KeyLocks::approval_key(approval_id)).await;

    let mut tx = pool.begin().await?;
    let mut request = fetch_request(&mut tx, approval_id).await?;
    let resolution = transition(&request)?;

    // attendance lock nests inside the approval lock, never the other way round
    let _attendance_guard = match (&request.payload, resolution.status.is_effectively_approved()) {
        (ApprovalPayload::Regularisation(p), true) => {
            let guard = locks
                .acquire(&KeyLocks::attendance_key(request.employee_id, p.date))
                .await;
            apply_regularisation(&mut tx, request.employee_id, p, resolution.decided_by, resolution.decided_at)
                .await?;
            Some(guard)
        }
        _ => None,
    };

    persist_resolution(&mut tx, approval_id, &resolution).await?;
    let entry = Activity::ApprovalResolved {
        status: resolution.status,
        kind: request.kind,
        employee: request.employee_name.as_deref(),
    };
    activity::record(&mut *tx, resolution.decided_by, &entry, resolution.decided_at).await?;
    tx.commit().await?;

    resolution.apply_to(&mut request);
    Ok(request)
}

/// Submit an approval request
#[utoipa::path(
    post,
    path = "/api/approvals",
    request_body = SubmitApproval,
    responses(
        (status = 201, description = "Request created as Pending", body = Object, example = json!({
            "status": "success", "message": "Request submitted", "id": 7
        })),
        (status = 400, description = "Payload does not match the type, or fails its checks"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
#[instrument(name = "approval_submit", skip(pool, config, body), fields(employee_id = auth.employee_id, kind = %body.kind))]
pub async fn submit(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: web::Json<SubmitApproval>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let now = config.now_local();

    let mut payload = ApprovalPayload::from_json(body.kind, body.payload)?;
    validate_submission(&payload, now.date(), config.regularisation_lookback_days)?;

    let approver_ok: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM employees WHERE id = ? AND role = 'admin' AND is_active = TRUE",
    )
    .bind(body.assigned_to)
    .fetch_one(pool.get_ref())
    .await?;
    if approver_ok == 0 {
        return Err(AppError::validation("assigned_to must be an active admin"));
    }

    if let ApprovalPayload::Regularisation(p) = &mut payload {
        let existing = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date = ?"
        ))
        .bind(auth.employee_id)
        .bind(p.date)
        .fetch_optional(pool.get_ref())
        .await?;
        capture_regularisation(p, existing.as_ref());
    }

    let result = sqlx::query(
        r#"
        INSERT INTO approvals (employee_id, kind, payload, assigned_to, status, created_at)
        VALUES (?, ?, ?, ?, 'Pending', ?)
        "#,
    )
    .bind(auth.employee_id)
    .bind(payload.kind().as_ref())
    .bind(Json(payload.to_json()))
    .bind(body.assigned_to)
    .bind(now)
    .execute(pool.get_ref())
    .await?;

    let id = result.last_insert_id();
    info!(approval_id = id, assigned_to = body.assigned_to, "Approval submitted");

    Ok(HttpResponse::Created().json(json!({
        "status": "success",
        "message": "Request submitted",
        "id": id,
    })))
}

/// Approve or reject a request assigned to the caller
#[utoipa::path(
    post,
    path = "/api/approvals/action",
    request_body = ApprovalAction,
    responses(
        (status = 200, description = "Decision recorded", body = Object, example = json!({
            "status": "success", "message": "Request approved"
        })),
        (status = 400, description = "Reject without a reason"),
        (status = 403, description = "Caller is not the assigned approver"),
        (status = 404, description = "Unknown approval"),
        (status = 409, description = "Already decided")
    ),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
pub async fn act(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    locks: web::Data<KeyLocks>,
    body: web::Json<ApprovalAction>,
) -> AppResult<HttpResponse> {
    let now = config.now_local();
    let action = body.action;

    let request = resolve(pool.get_ref(), &locks, body.approval_id, |req| {
        decide(req, auth.employee_id, action, body.reason.as_deref(), now)
    })
    .await?;

    info!(approval_id = request.id, status = %request.status, actor = auth.employee_id, "Approval decided");

    let message = match request.status {
        ApprovalStatus::Rejected => "Request rejected",
        _ => "Request approved",
    };
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": message,
        "request": request,
    })))
}

/// Admin override of a pending request
#[utoipa::path(
    post,
    path = "/api/approvals/{id}/override",
    params(("id" = u64, Path, description = "Approval id")),
    responses(
        (status = 200, description = "Request marked Overridden", body = ApprovalRequest),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Unknown approval"),
        (status = 409, description = "Already decided")
    ),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
pub async fn override_approval(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    locks: web::Data<KeyLocks>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let now = config.now_local();

    let request = resolve(pool.get_ref(), &locks, path.into_inner(), |req| {
        override_request(req, auth.employee_id, now)
    })
    .await?;

    warn!(approval_id = request.id, admin = auth.employee_id, "Approval overridden");
    Ok(HttpResponse::Ok().json(request))
}

/// Requests assigned to the caller
#[utoipa::path(
    get,
    path = "/api/approvals",
    params(ApprovalFilter),
    responses((status = 200, description = "Approver view", body = Vec<ApprovalRequest>)),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
pub async fn assigned_to_me(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ApprovalFilter>,
) -> AppResult<HttpResponse> {
    let requests = fetch_requests(pool.get_ref(), Audience::Approver(auth.employee_id), &query).await?;
    debug!(count = requests.len(), "Approver view");
    Ok(HttpResponse::Ok().json(requests))
}

/// Requests the caller submitted
#[utoipa::path(
    get,
    path = "/api/approvals/mine",
    params(ApprovalFilter),
    responses((status = 200, description = "Submitter view", body = Vec<ApprovalRequest>)),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
pub async fn mine(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ApprovalFilter>,
) -> AppResult<HttpResponse> {
    let requests = fetch_requests(pool.get_ref(), Audience::Submitter(auth.employee_id), &query).await?;
    Ok(HttpResponse::Ok().json(requests))
}

/// Dates covered by approved leave
#[utoipa::path(
    get,
    path = "/api/approvals/leave-calendar",
    params(CalendarQuery),
    responses(
        (status = 200, description = "Every date on leave plus the leaves behind them", body = Object, example = json!({
            "dates": ["2024-06-10", "2024-06-11", "2024-06-12"], "leaves": []
        })),
        (status = 403, description = "Another employee's calendar")
    ),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
pub async fn leave_calendar(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<CalendarQuery>,
) -> AppResult<HttpResponse> {
    let employee_id = query.employee_id.unwrap_or(auth.employee_id);
    if employee_id != auth.employee_id && !auth.is_admin() {
        return Err(AppError::forbidden("You can only view your own leave calendar"));
    }

    let filter = ApprovalFilter {
        status: None,
        kind: Some(ApprovalKind::Leave),
        order: Some(SortOrder::Asc),
    };
    let leaves: Vec<ApprovalRequest> = fetch_requests(pool.get_ref(), Audience::Submitter(employee_id), &filter)
        .await?
        .into_iter()
        .filter(|r| r.status.is_effectively_approved())
        .collect();

    let dates = crate::service::reporting::leave_dates(&leaves);

    Ok(HttpResponse::Ok().json(json!({
        "dates": dates,
        "leaves": leaves,
    })))
}
