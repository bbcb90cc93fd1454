//! Clock arithmetic for attendance: worked minutes, overtime and week grouping.
//!
//! Everything here is pure. Callers pass the dates and times they have; nothing
//! reads the system clock.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike};

use crate::model::attendance::AttendanceRecord;

pub const MINUTES_PER_DAY: i64 = 1440;
/// Standard working day; anything beyond counts as overtime.
pub const STANDARD_DAY_MINUTES: i64 = 480;

/// Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

fn minute_of_day(t: NaiveTime) -> i64 {
    i64::from(t.hour()) * 60 + i64::from(t.minute())
}

/// Minutes from `check_in` to `check_out` at minute resolution.
///
/// A check-out earlier than the check-in is read as an overnight shift and
/// wraps past midnight.
pub fn minutes_between(check_in: NaiveTime, check_out: NaiveTime) -> i64 {
    let start = minute_of_day(check_in);
    let mut end = minute_of_day(check_out);
    if end < start {
        end += MINUTES_PER_DAY;
    }
    end - start
}

pub fn overtime_minutes(check_in: NaiveTime, check_out: NaiveTime) -> i64 {
    (minutes_between(check_in, check_out) - STANDARD_DAY_MINUTES).max(0)
}

/// Worked minutes for a record, zero while either punch is missing.
pub fn worked_minutes(record: &AttendanceRecord) -> i64 {
    match (record.check_in, record.check_out) {
        (Some(i), Some(o)) => minutes_between(i, o),
        _ => 0,
    }
}

/// Monday of the ISO week containing `date`.
pub fn week_key(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

pub fn weekly_total(records: &[AttendanceRecord], employee_id: u64, week: NaiveDate) -> i64 {
    records
        .iter()
        .filter(|r| r.employee_id == employee_id && week_key(r.date) == week)
        .map(worked_minutes)
        .sum()
}

/// `780` → `"13h 0m"`
pub fn format_hm(minutes: i64) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// Serde adapters for optional clock times written as `HH:MM` or `HH:MM:SS`.
pub mod hhmm_opt {
    use super::parse_hhmm;
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => s.serialize_str(&t.format("%H:%M:%S").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => parse_hhmm(s)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid time {s:?}, expected HH:MM"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::{AttendanceStatus, DayType};

    fn t(raw: &str) -> NaiveTime {
        parse_hhmm(raw).unwrap()
    }

    fn d(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn record(employee_id: u64, date: &str, check_in: &str, check_out: &str) -> AttendanceRecord {
        AttendanceRecord {
            id: 0,
            employee_id,
            date: d(date),
            check_in: Some(t(check_in)),
            check_out: Some(t(check_out)),
            latitude: None,
            longitude: None,
            distance_m: None,
            status: AttendanceStatus::Present,
            day_type: DayType::Full,
            late_comment: None,
            regularised: false,
            audit: None,
        }
    }

    #[test]
    fn same_day_difference() {
        assert_eq!(minutes_between(t("09:15"), t("17:45")), 510);
        assert_eq!(minutes_between(t("09:00"), t("09:00")), 0);
    }

    #[test]
    fn checkout_before_checkin_wraps_overnight() {
        assert_eq!(minutes_between(t("22:00"), t("06:30")), 510);
        assert_eq!(minutes_between(t("10:00"), t("09:59")), 1439);
    }

    #[test]
    fn seconds_are_ignored() {
        assert_eq!(minutes_between(t("09:00:59"), t("10:00:01")), 60);
    }

    #[test]
    fn overtime_starts_after_eight_hours() {
        assert_eq!(overtime_minutes(t("09:00"), t("17:00")), 0);
        assert_eq!(overtime_minutes(t("09:00"), t("12:00")), 0);
        assert_eq!(overtime_minutes(t("09:00"), t("18:30")), 90);
    }

    #[test]
    fn week_key_is_monday() {
        // 2024-06-10 is a Monday
        assert_eq!(week_key(d("2024-06-10")), d("2024-06-10"));
        assert_eq!(week_key(d("2024-06-13")), d("2024-06-10"));
        assert_eq!(week_key(d("2024-06-16")), d("2024-06-10"));
        assert_eq!(week_key(d("2024-06-17")), d("2024-06-17"));
        // across a year boundary
        assert_eq!(week_key(d("2025-01-01")), d("2024-12-30"));
    }

    #[test]
    fn weekly_total_sums_one_employee_one_week() {
        let records = vec![
            record(1, "2024-06-10", "09:00", "17:00"), // 480
            record(1, "2024-06-12", "10:00", "15:00"), // 300
            record(1, "2024-06-17", "09:00", "17:00"), // next week
            record(2, "2024-06-11", "09:00", "17:00"), // someone else
        ];
        let total = weekly_total(&records, 1, week_key(d("2024-06-12")));
        assert_eq!(total, 780);
        assert_eq!(format_hm(total), "13h 0m");
    }

    #[test]
    fn open_records_count_as_zero() {
        let mut open = record(1, "2024-06-10", "09:00", "17:00");
        open.check_out = None;
        assert_eq!(worked_minutes(&open), 0);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_hhmm("25:00").is_none());
        assert!(parse_hhmm("nine").is_none());
        assert_eq!(parse_hhmm(" 07:05 "), Some(NaiveTime::from_hms_opt(7, 5, 0).unwrap()));
    }
}
