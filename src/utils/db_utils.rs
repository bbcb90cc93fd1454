use serde_json::Value;
use sqlx::MySqlPool;

use crate::error::{AppError, AppResult};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
///
/// Only keys listed in `allowed` may appear in `payload`; anything else is
/// rejected so a client can never name an arbitrary column.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> AppResult<SqlUpdate> {
    let obj = payload
        .as_object()
        .ok_or_else(|| AppError::validation("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(AppError::validation("No fields provided for update"));
    }

    if let Some(unknown) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(AppError::validation(format!("Field '{unknown}' cannot be updated")));
    }

    // Build SET clause
    let set_clause = obj
        .keys()
        .map(|k| format!("{k} = ?"))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {table} SET {set_clause} WHERE {id_column} = ?");

    let mut values = Vec::with_capacity(obj.len() + 1);

    // Convert JSON values → SqlValue
    for (key, value) in obj {
        let v = match value {
            Value::String(s) => SqlValue::String(s.trim().to_string()),
            Value::Number(n) => match (n.as_u64(), n.as_i64(), n.as_f64()) {
                (Some(u), _, _) => SqlValue::U64(u),
                (None, Some(i), _) => SqlValue::I64(i),
                (None, None, Some(f)) => SqlValue::F64(f),
                _ => return Err(AppError::validation(format!("Field '{key}' is not a valid number"))),
            },
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Null => SqlValue::Null,
            _ => return Err(AppError::validation(format!("Field '{key}' has an unsupported type"))),
        };
        values.push(v);
    }

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PROFILE: &[&str] = &["phone", "bio", "is_active"];

    #[test]
    fn builds_set_clause_in_payload_order() {
        let update = build_update_sql(
            "employees",
            &json!({"phone": " +91 98 ", "is_active": false}),
            PROFILE,
            "id",
            12,
        )
        .unwrap();

        assert_eq!(update.sql, "UPDATE employees SET phone = ?, is_active = ? WHERE id = ?");
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("+91 98".into()),
                SqlValue::Bool(false),
                SqlValue::U64(12)
            ]
        );
    }

    #[test]
    fn rejects_columns_outside_allowlist() {
        let err = build_update_sql("employees", &json!({"role": "admin"}), PROFILE, "id", 1).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_empty_payload() {
        assert!(build_update_sql("employees", &json!({}), PROFILE, "id", 1).is_err());
        assert!(build_update_sql("employees", &json!([1]), PROFILE, "id", 1).is_err());
    }
}
