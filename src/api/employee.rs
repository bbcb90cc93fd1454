use crate::{
    api::activity::record_detached,
    auth::{auth::AuthUser, password::hash_password},
    config::Config,
    error::{AppError, AppResult, is_duplicate_key},
    model::{
        activity::Activity,
        employee::{EMPLOYEE_COLUMNS, Employee, EmployeeSummary},
        role::Role,
    },
    utils::{
        db_utils::{build_update_sql, execute_update},
        email_cache, email_filter,
    },
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};

/// Columns an admin may change through `PUT /employees/{id}`.
const ADMIN_EDITABLE: &[&str] = &[
    "name",
    "email",
    "role",
    "phone",
    "department",
    "address",
    "bio",
    "blood_group",
    "is_active",
    "password_hash",
];

/// Columns an employee may change on their own profile.
const PROFILE_EDITABLE: &[&str] = &["name", "phone", "address", "bio", "blood_group"];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "Asha Patil")]
    pub name: String,
    #[schema(example = "asha@company.com", format = "email")]
    pub email: String,
    #[schema(example = "s3cret!", format = "password")]
    pub password: String,
    #[serde(default = "default_role")]
    #[schema(example = "employee", value_type = String)]
    pub role: Role,
    pub phone: Option<String>,
    #[schema(example = "Operations")]
    pub department: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
    #[schema(example = "B+")]
    pub blood_group: Option<String>,
}

fn default_role() -> Role {
    Role::Employee
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Search by name or email
    pub search: Option<String>,
    /// Deactivated accounts are hidden unless this is true
    pub include_inactive: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

/// true  => email AVAILABLE
/// false => email TAKEN
pub async fn is_email_available(email: &str, pool: &MySqlPool) -> AppResult<bool> {
    let email = email_filter::normalize(email);

    // Cuckoo filter: a miss means the email was never registered
    if !email_filter::might_exist(&email) {
        return Ok(true);
    }

    // Moka cache: known taken
    if email_cache::is_taken(&email).await {
        return Ok(false);
    }

    // Database fallback
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees WHERE email = ?")
        .bind(&email)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        email_cache::mark_taken(&email).await;
        return Ok(false);
    }

    Ok(true)
}

async fn find_employee(pool: &MySqlPool, id: u64) -> AppResult<Employee> {
    sqlx::query_as::<_, Employee>(&format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Employee not found"))
}

fn validate_email(email: &str) -> AppResult<()> {
    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::validation("A valid email is required")),
    }
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 400, description = "Missing name, email or password"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateEmployee>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let name = payload.name.trim();
    let email = email_filter::normalize(&payload.email);
    if name.is_empty() || payload.password.is_empty() {
        return Err(AppError::validation("Name and password are required"));
    }
    validate_email(&email)?;

    if !is_email_available(&email, pool.get_ref()).await? {
        return Err(AppError::conflict("Email already registered"));
    }

    let hashed = hash_password(&payload.password)
        .map_err(|e| AppError::Infrastructure(format!("password hashing failed: {e}")))?;

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (name, email, password_hash, role, phone, department, address, bio, blood_group)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(&email)
    .bind(&hashed)
    .bind(payload.role.as_ref())
    .bind(&payload.phone)
    .bind(&payload.department)
    .bind(&payload.address)
    .bind(&payload.bio)
    .bind(&payload.blood_group)
    .execute(pool.get_ref())
    .await;

    let id = match result {
        Ok(r) => r.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => return Err(AppError::conflict("Email already registered")),
        Err(e) => return Err(e.into()),
    };

    // keep the availability index in step with the table
    email_filter::insert(&email);
    email_cache::mark_taken(&email).await;

    info!(employee_id = id, created_by = auth.employee_id, "Employee created");
    record_detached(pool.get_ref(), auth.employee_id, Activity::EmployeeAdded { name }, config.now_local()).await;

    let employee = find_employee(pool.get_ref(), id).await?;
    Ok(HttpResponse::Created().json(employee))
}

/// List Employees
#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 403, description = "Admin only")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if !query.include_inactive.unwrap_or(false) {
        conditions.push("is_active = TRUE");
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push("(name LIKE ? OR email LIKE ?)");
        let like = format!("%{search}%");
        bindings.push(like.clone());
        bindings.push(like);
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM employees {where_clause}");
    debug!(sql = %count_sql, bindings = ?bindings, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }
    let total = count_query.fetch_one(pool.get_ref()).await?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees {where_clause} ORDER BY id DESC LIMIT ? OFFSET ?"
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    let employees = data_query
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Get Employee by ID (admin, or the employee themself)
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 403, description = "Another employee's record"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let employee_id = path.into_inner();
    if employee_id != auth.employee_id {
        auth.require_admin()?;
    }
    Ok(HttpResponse::Ok().json(find_employee(pool.get_ref(), employee_id).await?))
}

/// Turns an admin edit body into column values: validates role and email,
/// and swaps a plain `password` for its hash.
async fn prepare_admin_update(pool: &MySqlPool, current: &Employee, mut body: Value) -> AppResult<Value> {
    let obj = body
        .as_object_mut()
        .ok_or_else(|| AppError::validation("Payload must be a JSON object"))?;

    if obj.contains_key("password_hash") || obj.contains_key("id") {
        return Err(AppError::validation("Field cannot be updated"));
    }

    if let Some(role) = obj.get("role") {
        let valid = role.as_str().and_then(|r| r.parse::<Role>().ok()).is_some();
        if !valid {
            return Err(AppError::validation("role must be 'admin' or 'employee'"));
        }
    }

    if let Some(email) = obj.get("email").cloned() {
        let email = email
            .as_str()
            .map(email_filter::normalize)
            .ok_or_else(|| AppError::validation("email must be a string"))?;
        validate_email(&email)?;
        if email != current.email && !is_email_available(&email, pool).await? {
            return Err(AppError::conflict("Email already registered"));
        }
        obj.insert("email".into(), Value::String(email));
    }

    if let Some(password) = obj.remove("password") {
        let password = password
            .as_str()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::validation("password must be a non-empty string"))?;
        let hashed = hash_password(password)
            .map_err(|e| AppError::Infrastructure(format!("password hashing failed: {e}")))?;
        obj.insert("password_hash".into(), Value::String(hashed));
    }

    Ok(body)
}

/// Update Employee (admin)
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    request_body(content = Object, description = "Any of name, email, password, role, phone, department, address, bio, blood_group, is_active"),
    responses(
        (status = 200, description = "Updated employee", body = Employee),
        (status = 400, description = "Unknown or invalid field"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let current = find_employee(pool.get_ref(), employee_id).await?;
    let body = prepare_admin_update(pool.get_ref(), &current, body.into_inner()).await?;

    let update = build_update_sql("employees", &body, ADMIN_EDITABLE, "id", employee_id)?;
    match execute_update(pool.get_ref(), update).await {
        Ok(_) => {}
        Err(e) if is_duplicate_key(&e) => return Err(AppError::conflict("Email already registered")),
        Err(e) => return Err(e.into()),
    }

    let updated = find_employee(pool.get_ref(), employee_id).await?;
    if updated.email != current.email {
        email_filter::remove(&current.email);
        email_cache::forget(&current.email).await;
        email_filter::insert(&updated.email);
        email_cache::mark_taken(&updated.email).await;
    }

    info!(employee_id, updated_by = auth.employee_id, "Employee updated");
    Ok(HttpResponse::Ok().json(updated))
}

/// Deactivate Employee (admin). Records are kept for history.
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Deactivated", body = Object, example = json!({
            "message": "Employee deactivated"
        })),
        (status = 400, description = "Cannot deactivate yourself"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let employee_id = path.into_inner();
    if employee_id == auth.employee_id {
        return Err(AppError::validation("You cannot deactivate your own account"));
    }

    let res = sqlx::query("UPDATE employees SET is_active = FALSE WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await?;

    if res.rows_affected() == 0 {
        find_employee(pool.get_ref(), employee_id).await?;
    }

    // outstanding refresh tokens die with the account
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE employee_id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await?;

    warn!(employee_id, by = auth.employee_id, "Employee deactivated");
    let activity = Activity::EmployeeDeactivated { id: employee_id };
    record_detached(pool.get_ref(), auth.employee_id, activity, config.now_local()).await;
    Ok(HttpResponse::Ok().json(json!({ "message": "Employee deactivated" })))
}

/// Active admins that can be picked as approvers
#[utoipa::path(
    get,
    path = "/api/employees/approvers",
    responses((status = 200, description = "Approvers", body = Vec<EmployeeSummary>)),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_approvers(_auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let approvers = sqlx::query_as::<_, EmployeeSummary>(
        "SELECT id, name, email FROM employees WHERE role = 'admin' AND is_active = TRUE ORDER BY name",
    )
    .fetch_all(pool.get_ref())
    .await?;
    Ok(HttpResponse::Ok().json(approvers))
}

/// The caller's own profile
#[utoipa::path(
    get,
    path = "/api/profile",
    responses((status = 200, description = "Profile", body = Employee)),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_profile(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(find_employee(pool.get_ref(), auth.employee_id).await?))
}

/// Self-service profile edit
#[utoipa::path(
    put,
    path = "/api/profile",
    request_body(content = Object, description = "Any of name, phone, address, bio, blood_group"),
    responses(
        (status = 200, description = "Updated profile", body = Employee),
        (status = 400, description = "Field not editable from the profile")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    let update = build_update_sql("employees", &body, PROFILE_EDITABLE, "id", auth.employee_id)?;
    execute_update(pool.get_ref(), update).await?;

    debug!(employee_id = auth.employee_id, "Profile updated");
    Ok(HttpResponse::Ok().json(find_employee(pool.get_ref(), auth.employee_id).await?))
}
