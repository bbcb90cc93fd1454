use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::{AppError, AppResult, is_duplicate_key},
    model::attendance::{ATTENDANCE_COLUMNS, AttendanceRecord, AuditSnapshot},
    service::{
        attendance::{CheckInOutcome, CheckOutOutcome},
        geofence::Coordinates,
        reporting::{AttendanceSummary, WorkedTime, attendance_summary, worked_times},
        time_utils::format_hm,
    },
    utils::key_lock::KeyLocks,
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use std::collections::HashMap;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CheckInRequest {
    #[schema(example = 20.0107)]
    pub lat: f64,
    #[schema(example = 73.742)]
    pub lng: f64,
    /// Required on the second call when the first returned `late_comment_required`.
    #[schema(example = "Train delayed")]
    pub late_comment: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CheckInResponse {
    #[schema(example = "Present")]
    pub status: &'static str,
    /// meters from the office, rounded
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = 42)]
    pub distance: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct CheckOutResponse {
    #[schema(example = "success")]
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "18:02")]
    pub check_out_time: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceFilter {
    pub employee_id: Option<u64>,
    #[param(example = "2024-06-01", value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    #[param(example = "2024-06-30", value_type = Option<String>)]
    pub to: Option<NaiveDate>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    /// defaults to the caller
    pub employee_id: Option<u64>,
    #[param(example = "2024-06-11", value_type = String)]
    pub date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceLogEntry {
    #[schema(value_type = Object)]
    pub record: AttendanceRecord,
    pub employee_name: Option<String>,
    pub worked: WorkedTime,
    #[schema(example = "13h 0m")]
    pub weekly_hm: String,
}

#[derive(Serialize, ToSchema)]
pub struct MyAttendance {
    pub summary: AttendanceSummary,
    #[schema(value_type = Vec<Object>)]
    pub records: Vec<AttendanceRecord>,
}

async fn find_day(pool: &MySqlPool, employee_id: u64, date: NaiveDate) -> AppResult<Option<AttendanceRecord>> {
    let row = sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date = ?"
    ))
    .bind(employee_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

async fn list_records(pool: &MySqlPool, filter: &AttendanceFilter) -> AppResult<Vec<AttendanceRecord>> {
    let mut qb: QueryBuilder<MySql> =
        QueryBuilder::new(format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE 1 = 1"));

    if let Some(employee_id) = filter.employee_id {
        qb.push(" AND employee_id = ").push_bind(employee_id);
    }
    if let Some(from) = filter.from {
        qb.push(" AND date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND date <= ").push_bind(to);
    }
    qb.push(" ORDER BY date DESC, id DESC");

    Ok(qb.build_query_as::<AttendanceRecord>().fetch_all(pool).await?)
}

fn hhmm(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Outcome of the attempt; only `Present` records a check-in", body = CheckInResponse),
        (status = 400, description = "Invalid coordinates"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    locks: web::Data<KeyLocks>,
    payload: web::Json<CheckInRequest>,
) -> AppResult<HttpResponse> {
    let at = Coordinates {
        lat: payload.lat,
        lng: payload.lng,
    };
    if !at.is_valid() {
        return Err(AppError::validation("lat/lng out of range"));
    }

    let now = config.now_local();
    let today = now.date();
    let employee_id = auth.employee_id;

    let _guard = locks.acquire(&KeyLocks::attendance_key(employee_id, today)).await;
    let existing = find_day(pool.get_ref(), employee_id, today).await?;

    let outcome = config.attendance.evaluate_check_in(
        now.time(),
        at,
        existing.as_ref(),
        payload.late_comment.as_deref(),
    );
    debug!(employee_id, status = outcome.wire_status(), "Check-in evaluated");

    let outcome = match outcome {
        CheckInOutcome::Present {
            distance,
            day_type,
            late_comment,
        } => {
            let stored = match &existing {
                // row left behind by a regularisation, punch not yet recorded
                Some(row) => sqlx::query(
                    r#"
                    UPDATE attendance
                    SET check_in = ?, latitude = ?, longitude = ?, distance_m = ?,
                        status = 'Present', day_type = ?, late_comment = ?
                    WHERE id = ? AND check_in IS NULL
                    "#,
                )
                .bind(now.time())
                .bind(at.lat)
                .bind(at.lng)
                .bind(distance)
                .bind(day_type.as_ref())
                .bind(&late_comment)
                .bind(row.id)
                .execute(pool.get_ref())
                .await
                .map(|r| r.rows_affected() == 1),
                None => sqlx::query(
                    r#"
                    INSERT INTO attendance
                    (employee_id, date, check_in, latitude, longitude, distance_m, status, day_type, late_comment)
                    VALUES (?, ?, ?, ?, ?, ?, 'Present', ?, ?)
                    "#,
                )
                .bind(employee_id)
                .bind(today)
                .bind(now.time())
                .bind(at.lat)
                .bind(at.lng)
                .bind(distance)
                .bind(day_type.as_ref())
                .bind(&late_comment)
                .execute(pool.get_ref())
                .await
                .map(|_| true),
            };

            match stored {
                Ok(true) => {
                    info!(employee_id, %day_type, "Checked in");
                    CheckInOutcome::Present {
                        distance,
                        day_type,
                        late_comment,
                    }
                }
                Ok(false) => CheckInOutcome::AlreadyMarked,
                Err(e) if is_duplicate_key(&e) => CheckInOutcome::AlreadyMarked,
                Err(e) => return Err(e.into()),
            }
        }
        other => other,
    };

    Ok(HttpResponse::Ok().json(CheckInResponse {
        status: outcome.wire_status(),
        distance: outcome.distance().map(|d| d.round() as i64),
    }))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Outcome of the attempt; only `success` records a check-out", body = CheckOutResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    locks: web::Data<KeyLocks>,
) -> AppResult<HttpResponse> {
    let now = config.now_local();
    let today = now.date();
    let employee_id = auth.employee_id;

    let _guard = locks.acquire(&KeyLocks::attendance_key(employee_id, today)).await;
    let existing = find_day(pool.get_ref(), employee_id, today).await?;

    let mut outcome = config.attendance.evaluate_check_out(now.time(), existing.as_ref());

    let checked_out_at = match outcome {
        CheckOutOutcome::CheckedOut { at } => Some(at),
        _ => None,
    };

    if let (Some(at), Some(row)) = (checked_out_at, existing.as_ref()) {
        let updated = sqlx::query("UPDATE attendance SET check_out = ? WHERE id = ? AND check_out IS NULL")
            .bind(at)
            .bind(row.id)
            .execute(pool.get_ref())
            .await?;
        if updated.rows_affected() == 0 {
            outcome = CheckOutOutcome::AlreadyCheckedOut;
        } else {
            info!(employee_id, "Checked out");
        }
    }

    let check_out_time = match &outcome {
        CheckOutOutcome::CheckedOut { at } => Some(hhmm(*at)),
        _ => None,
    };

    Ok(HttpResponse::Ok().json(CheckOutResponse {
        status: outcome.wire_status(),
        check_out_time,
    }))
}

/// Today's attendance state for the caller
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "not_marked, checked_in or checked_out", body = Object, example = json!({
            "status": "checked_in", "check_in": "09:42", "check_out": null, "day_type": "FULL"
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let today = config.now_local().date();
    let row = find_day(pool.get_ref(), auth.employee_id, today).await?;

    let body = match row {
        Some(r) if r.check_in.is_some() => json!({
            "status": if r.check_out.is_some() { "checked_out" } else { "checked_in" },
            "date": today,
            "check_in": r.check_in.map(hhmm),
            "check_out": r.check_out.map(hhmm),
            "day_type": r.day_type,
            "late_comment": r.late_comment,
        }),
        _ => json!({ "status": "not_marked", "date": today }),
    };

    Ok(HttpResponse::Ok().json(body))
}

/// The caller's own attendance with a summary
#[utoipa::path(
    get,
    path = "/api/attendance/me",
    params(AttendanceFilter),
    responses(
        (status = 200, description = "Summary and records, newest first", body = MyAttendance),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceFilter>,
) -> AppResult<HttpResponse> {
    let filter = AttendanceFilter {
        employee_id: Some(auth.employee_id),
        from: query.from,
        to: query.to,
    };
    let records = list_records(pool.get_ref(), &filter).await?;

    Ok(HttpResponse::Ok().json(MyAttendance {
        summary: attendance_summary(&records),
        records,
    }))
}

/// Attendance log across employees (admin)
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceFilter),
    responses(
        (status = 200, description = "Records with worked, weekly and overtime minutes", body = Vec<AttendanceLogEntry>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_log(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceFilter>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let records = list_records(pool.get_ref(), &query).await?;

    let names: HashMap<u64, String> = sqlx::query_as::<_, (u64, String)>("SELECT id, name FROM employees")
        .fetch_all(pool.get_ref())
        .await?
        .into_iter()
        .collect();

    let worked = worked_times(&records);
    let entries: Vec<AttendanceLogEntry> = records
        .into_iter()
        .zip(worked)
        .map(|(record, worked)| AttendanceLogEntry {
            employee_name: names.get(&record.employee_id).cloned(),
            weekly_hm: format_hm(worked.weekly_minutes),
            record,
            worked,
        })
        .collect();

    Ok(HttpResponse::Ok().json(entries))
}

/// Regularisation audit trail stored on one attendance day
#[utoipa::path(
    get,
    path = "/api/attendance/audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Stored audit snapshot", body = Object),
        (status = 403, description = "Another employee's audit"),
        (status = 404, description = "No audit for that day")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn audit(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AuditQuery>,
) -> AppResult<HttpResponse> {
    let employee_id = query.employee_id.unwrap_or(auth.employee_id);
    if employee_id != auth.employee_id && !auth.is_admin() {
        return Err(AppError::forbidden("You can only view your own audit trail"));
    }

    let snapshot: AuditSnapshot = find_day(pool.get_ref(), employee_id, query.date)
        .await?
        .and_then(|r| r.audit)
        .map(|json| json.0)
        .ok_or_else(|| AppError::not_found("not_found"))?;

    Ok(HttpResponse::Ok().json(snapshot))
}
