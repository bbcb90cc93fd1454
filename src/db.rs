use anyhow::{Context, anyhow};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use tracing::info;

use crate::auth::password::hash_password;
use crate::config::BootstrapAdmin;
use crate::model::role::Role;

pub async fn init_db(database_url: &str) -> anyhow::Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    Ok(pool)
}

/// Creates the first admin when the table has none, so a fresh install can log in.
pub async fn ensure_bootstrap_admin(pool: &MySqlPool, admin: &BootstrapAdmin) -> anyhow::Result<()> {
    let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees WHERE role = ? AND is_active = TRUE")
        .bind(Role::Admin.as_ref())
        .fetch_one(pool)
        .await?;
    if admins > 0 {
        return Ok(());
    }

    let password_hash = hash_password(&admin.password).map_err(|e| anyhow!("hash bootstrap password: {e}"))?;
    let email = admin.email.trim().to_lowercase();

    sqlx::query(
        r#"
        INSERT INTO employees (name, email, password_hash, role, is_active)
        VALUES (?, ?, ?, ?, TRUE)
        ON DUPLICATE KEY UPDATE role = VALUES(role), is_active = TRUE
        "#,
    )
    .bind(&admin.name)
    .bind(&email)
    .bind(password_hash)
    .bind(Role::Admin.as_ref())
    .execute(pool)
    .await?;

    info!(%email, "Bootstrap admin created");
    Ok(())
}
