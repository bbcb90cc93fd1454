use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Announcements and newsletters share one table and one lifecycle.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NoticeChannel {
    Announcement,
    Newsletter,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Notice {
    #[schema(example = 5)]
    pub id: u64,
    #[sqlx(try_from = "String")]
    #[schema(example = "announcement", value_type = String)]
    pub channel: NoticeChannel,
    #[schema(example = "Office closed on Friday")]
    pub title: String,
    pub body: String,
    pub created_by: u64,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Suggestion {
    #[schema(example = 9)]
    pub id: u64,
    pub title: String,
    pub description: String,
    #[schema(example = "General")]
    pub category: String,
    #[schema(example = "pending")]
    pub status: String,
    pub submitted_by: u64,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitter_name: Option<String>,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
}
