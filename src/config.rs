use anyhow::{Context, Result, anyhow};
use chrono::{FixedOffset, NaiveDateTime, NaiveTime, Utc};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

use crate::service::attendance::AttendancePolicy;
use crate::service::geofence::Coordinates;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_level: tracing::Level,

    /// Offset of the office's wall clock from UTC; every business-day rule uses it.
    pub tz_offset: FixedOffset,
    pub attendance: AttendancePolicy,
    pub regularisation_lookback_days: i64,

    /// Seed admin created on startup when no admin exists yet.
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Clone)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| anyhow!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow!("{key}: invalid value {raw:?}: {e}"))
}

fn time_or(key: &str, default: &str) -> Result<NaiveTime> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    NaiveTime::parse_from_str(&raw, "%H:%M")
        .with_context(|| format!("{key}: expected HH:MM, got {raw:?}"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let tz_minutes: i32 = parsed_or("TZ_OFFSET_MINUTES", "330")?; // IST
        let tz_offset = FixedOffset::east_opt(tz_minutes * 60)
            .ok_or_else(|| anyhow!("TZ_OFFSET_MINUTES out of range: {tz_minutes}"))?;

        let attendance = AttendancePolicy {
            office: Coordinates {
                lat: parsed_or("OFFICE_LAT", "20.010681255547066")?,
                lng: parsed_or("OFFICE_LNG", "73.7419943864044")?,
            },
            radius_meters: parsed_or("OFFICE_RADIUS_METERS", "100")?,
            window_start: time_or("CHECKIN_WINDOW_START", "09:00")?,
            window_end: time_or("CHECKIN_WINDOW_END", "11:00")?,
            window_enforced: parsed_or("CHECKIN_WINDOW_ENFORCED", "true")?,
            late_after: time_or("LATE_CUTOFF", "10:30")?,
            checkout_after: time_or("CHECKOUT_CUTOFF", "17:45")?,
        };

        let log_level = env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "debug".to_string())
            .parse::<tracing::Level>()
            .map_err(|e| anyhow!("LOG_LEVEL: {e}"))?;

        let bootstrap_admin = match (
            env::var("BOOTSTRAP_ADMIN_EMAIL"),
            env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) => Some(BootstrapAdmin {
                name: env::var("BOOTSTRAP_ADMIN_NAME").unwrap_or_else(|_| "Admin".to_string()),
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parsed_or("ACCESS_TOKEN_TTL", "900")?, // 15 min
            refresh_token_ttl: parsed_or("REFRESH_TOKEN_TTL", "604800")?, // 7 days

            rate_login_per_min: parsed_or("RATE_LOGIN_PER_MIN", "60")?,
            rate_refresh_per_min: parsed_or("RATE_REFRESH_PER_MIN", "30")?,
            rate_protected_per_min: parsed_or("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            log_level,

            tz_offset,
            attendance,
            regularisation_lookback_days: parsed_or("REGULARISATION_LOOKBACK_DAYS", "7")?,
            bootstrap_admin,
        })
    }

    /// Current wall-clock time at the office.
    pub fn now_local(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz_offset).naive_local()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_config() -> Config {
        Config {
            database_url: "mysql://root@localhost/hrms_test".into(),
            jwt_secret: "test-secret".into(),
            server_addr: "127.0.0.1:0".into(),
            access_token_ttl: 900,
            refresh_token_ttl: 3600,
            rate_login_per_min: 60,
            rate_refresh_per_min: 30,
            rate_protected_per_min: 1000,
            api_prefix: "/api".into(),
            log_level: tracing::Level::DEBUG,
            tz_offset: FixedOffset::east_opt(330 * 60).unwrap(),
            attendance: crate::service::attendance::tests::policy(),
            regularisation_lookback_days: 7,
            bootstrap_admin: None,
        }
    }

    /// Pool that never connects until a query runs; for handlers that must
    /// fail before touching the database.
    pub(crate) fn lazy_pool() -> sqlx::MySqlPool {
        sqlx::mysql::MySqlPoolOptions::new()
            .connect_lazy(&test_config().database_url)
            .unwrap()
    }

    #[test]
    fn office_clock_uses_the_configured_offset() {
        let config = test_config();
        let utc = Utc::now().naive_utc();
        let drift = config.now_local() - utc;
        assert!((drift.num_minutes() - 330).abs() <= 1);
    }
}
