use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::model::role::Role;

/// Audience of a shared file: one employee or everybody.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareTarget {
    All,
    Employee(u64),
}

impl fmt::Display for ShareTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareTarget::All => f.write_str("all"),
            ShareTarget::Employee(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for ShareTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(ShareTarget::All);
        }
        s.parse::<u64>()
            .map(ShareTarget::Employee)
            .map_err(|_| format!("shared_with must be an employee id or \"all\", got {s:?}"))
    }
}

impl TryFrom<String> for ShareTarget {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Serialize for ShareTarget {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ShareTarget {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Id(u64),
            Text(String),
        }

        match Raw::deserialize(d)? {
            Raw::Id(id) => Ok(ShareTarget::Employee(id)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct SharedFile {
    #[schema(example = 3)]
    pub id: u64,
    #[schema(example = "kra_2024_q2.pdf")]
    pub filename: String,
    #[schema(example = "/uploads/kra_2024_q2.pdf")]
    pub file_url: String,
    pub description: String,
    #[schema(example = "KRA")]
    pub file_type: String,
    #[sqlx(try_from = "String")]
    #[schema(example = "all", value_type = String)]
    pub shared_with: ShareTarget,
    pub shared_by: u64,
    #[schema(value_type = String)]
    pub uploaded_at: NaiveDateTime,
    #[schema(value_type = Option<String>)]
    pub downloaded_at: Option<NaiveDateTime>,
}

impl SharedFile {
    pub fn visible_to(&self, employee_id: u64, role: Role) -> bool {
        role == Role::Admin
            || self.shared_by == employee_id
            || match self.shared_with {
                ShareTarget::All => true,
                ShareTarget::Employee(id) => id == employee_id,
            }
    }

    /// Only the sharer or an admin may withdraw a file.
    pub fn removable_by(&self, employee_id: u64, role: Role) -> bool {
        role == Role::Admin || self.shared_by == employee_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn file(shared_with: ShareTarget) -> SharedFile {
        SharedFile {
            id: 1,
            filename: "kra.pdf".into(),
            file_url: "/uploads/kra.pdf".into(),
            description: String::new(),
            file_type: "KRA".into(),
            shared_with,
            shared_by: 1,
            uploaded_at: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            downloaded_at: None,
        }
    }

    #[test]
    fn parses_id_or_all() {
        assert_eq!("all".parse::<ShareTarget>().unwrap(), ShareTarget::All);
        assert_eq!("42".parse::<ShareTarget>().unwrap(), ShareTarget::Employee(42));
        assert!("everyone".parse::<ShareTarget>().is_err());

        let from_number: ShareTarget = serde_json::from_str("7").unwrap();
        assert_eq!(from_number, ShareTarget::Employee(7));
        assert_eq!(serde_json::to_string(&ShareTarget::All).unwrap(), "\"all\"");
    }

    #[test]
    fn visibility() {
        let for_seven = file(ShareTarget::Employee(7));
        assert!(for_seven.visible_to(7, Role::Employee));
        assert!(!for_seven.visible_to(8, Role::Employee));
        assert!(for_seven.visible_to(8, Role::Admin));
        assert!(file(ShareTarget::All).visible_to(8, Role::Employee));
        assert!(!for_seven.removable_by(7, Role::Employee));
    }
}
