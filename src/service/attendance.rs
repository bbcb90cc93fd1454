//! Check-in / check-out rules.
//!
//! The handlers load today's row (if any), call into here with the current
//! office time and act on the returned outcome. Nothing in this module touches
//! storage or the clock.

use chrono::NaiveTime;

use crate::model::attendance::{AttendanceRecord, DayType};
use crate::service::geofence::{Coordinates, distance_meters};

#[derive(Debug, Clone)]
pub struct AttendancePolicy {
    pub office: Coordinates,
    pub radius_meters: f64,
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
    /// When false, check-in is accepted at any time of day.
    pub window_enforced: bool,
    /// Check-ins strictly after this time are late and count as half days.
    pub late_after: NaiveTime,
    pub checkout_after: NaiveTime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckInOutcome {
    AlreadyMarked,
    TimeBlocked,
    Outside { distance: f64 },
    /// Late and no comment given; the client asks for one and calls again.
    LateCommentRequired { distance: f64 },
    Present {
        distance: f64,
        day_type: DayType,
        late_comment: Option<String>,
    },
}

impl CheckInOutcome {
    pub fn wire_status(&self) -> &'static str {
        match self {
            CheckInOutcome::AlreadyMarked => "already_marked",
            CheckInOutcome::TimeBlocked => "time_blocked",
            CheckInOutcome::Outside { .. } => "Outside",
            CheckInOutcome::LateCommentRequired { .. } => "late_comment_required",
            CheckInOutcome::Present { .. } => "Present",
        }
    }

    pub fn distance(&self) -> Option<f64> {
        match self {
            CheckInOutcome::Outside { distance }
            | CheckInOutcome::LateCommentRequired { distance }
            | CheckInOutcome::Present { distance, .. } => Some(*distance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutOutcome {
    TimeBlocked,
    NotCheckedIn,
    AlreadyCheckedOut,
    CheckedOut { at: NaiveTime },
}

impl CheckOutOutcome {
    pub fn wire_status(&self) -> &'static str {
        match self {
            CheckOutOutcome::TimeBlocked => "time_blocked",
            CheckOutOutcome::NotCheckedIn => "not_checked_in",
            CheckOutOutcome::AlreadyCheckedOut => "already_checked_out",
            CheckOutOutcome::CheckedOut { .. } => "success",
        }
    }
}

impl AttendancePolicy {
    fn in_window(&self, now: NaiveTime) -> bool {
        !self.window_enforced || (now >= self.window_start && now <= self.window_end)
    }

    /// `today` is the caller's row for the current date, if one exists.
    pub fn evaluate_check_in(
        &self,
        now: NaiveTime,
        at: Coordinates,
        today: Option<&AttendanceRecord>,
        late_comment: Option<&str>,
    ) -> CheckInOutcome {
        if today.is_some_and(|r| r.check_in.is_some()) {
            return CheckInOutcome::AlreadyMarked;
        }

        if !self.in_window(now) {
            return CheckInOutcome::TimeBlocked;
        }

        let distance = distance_meters(at, self.office);
        if distance > self.radius_meters {
            return CheckInOutcome::Outside { distance };
        }

        let late_comment = late_comment
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        let late = now > self.late_after;

        if late && late_comment.is_none() {
            return CheckInOutcome::LateCommentRequired { distance };
        }

        CheckInOutcome::Present {
            distance,
            day_type: if late { DayType::Half } else { DayType::Full },
            late_comment,
        }
    }

    pub fn evaluate_check_out(&self, now: NaiveTime, today: Option<&AttendanceRecord>) -> CheckOutOutcome {
        if now < self.checkout_after {
            return CheckOutOutcome::TimeBlocked;
        }

        match today {
            Some(r) if r.check_in.is_none() => CheckOutOutcome::NotCheckedIn,
            None => CheckOutOutcome::NotCheckedIn,
            Some(r) if r.check_out.is_some() => CheckOutOutcome::AlreadyCheckedOut,
            Some(_) => CheckOutOutcome::CheckedOut { at: now },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::attendance::AttendanceStatus;
    use chrono::NaiveDate;

    pub(crate) fn policy() -> AttendancePolicy {
        AttendancePolicy {
            office: Coordinates { lat: 12.9716, lng: 77.5946 },
            radius_meters: 200.0,
            window_start: hm(9, 0),
            window_end: hm(11, 0),
            window_enforced: true,
            late_after: hm(10, 30),
            checkout_after: hm(17, 45),
        }
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    const NEAR: Coordinates = Coordinates { lat: 12.9720, lng: 77.5950 };

    fn checked_in_at(t: NaiveTime) -> AttendanceRecord {
        AttendanceRecord {
            id: 1,
            employee_id: 5,
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            check_in: Some(t),
            check_out: None,
            latitude: Some(NEAR.lat),
            longitude: Some(NEAR.lng),
            distance_m: Some(60.0),
            status: AttendanceStatus::Present,
            day_type: DayType::Full,
            late_comment: None,
            regularised: false,
            audit: None,
        }
    }

    #[test]
    fn on_time_inside_is_present_full_day() {
        let out = policy().evaluate_check_in(hm(9, 30), NEAR, None, None);
        match out {
            CheckInOutcome::Present { distance, day_type, .. } => {
                assert!((50.0..70.0).contains(&distance));
                assert_eq!(day_type, DayType::Full);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn far_away_is_outside_and_reports_distance() {
        let far = Coordinates { lat: 12.9716 + 0.044966, lng: 77.5946 };
        let out = policy().evaluate_check_in(hm(9, 30), far, None, None);
        assert_eq!(out.wire_status(), "Outside");
        let d = out.distance().unwrap();
        assert!((d - 5000.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn second_check_in_is_already_marked() {
        let existing = checked_in_at(hm(9, 5));
        let before = existing.clone();
        let out = policy().evaluate_check_in(hm(9, 40), NEAR, Some(&existing), None);
        assert_eq!(out, CheckInOutcome::AlreadyMarked);
        assert_eq!(existing.check_in, before.check_in);
    }

    #[test]
    fn outside_window_is_blocked_unless_disabled() {
        assert_eq!(policy().evaluate_check_in(hm(8, 59), NEAR, None, None), CheckInOutcome::TimeBlocked);
        assert_eq!(policy().evaluate_check_in(hm(11, 1), NEAR, None, None), CheckInOutcome::TimeBlocked);

        let relaxed = AttendancePolicy { window_enforced: false, ..policy() };
        assert_eq!(relaxed.evaluate_check_in(hm(7, 0), NEAR, None, None).wire_status(), "Present");
    }

    #[test]
    fn late_needs_a_comment_then_counts_half_day() {
        let p = policy();
        let first = p.evaluate_check_in(hm(10, 45), NEAR, None, None);
        assert_eq!(first.wire_status(), "late_comment_required");

        let blank = p.evaluate_check_in(hm(10, 45), NEAR, None, Some("   "));
        assert_eq!(blank.wire_status(), "late_comment_required");

        match p.evaluate_check_in(hm(10, 45), NEAR, None, Some("train delayed")) {
            CheckInOutcome::Present { day_type, late_comment, .. } => {
                assert_eq!(day_type, DayType::Half);
                assert_eq!(late_comment.as_deref(), Some("train delayed"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn exactly_at_cutoff_is_not_late() {
        let out = policy().evaluate_check_in(hm(10, 30), NEAR, None, None);
        assert_eq!(out.wire_status(), "Present");
    }

    #[test]
    fn regularised_row_without_punch_still_allows_check_in() {
        let mut row = checked_in_at(hm(9, 0));
        row.check_in = None;
        let out = policy().evaluate_check_in(hm(9, 30), NEAR, Some(&row), None);
        assert_eq!(out.wire_status(), "Present");
    }

    #[test]
    fn check_out_rules() {
        let p = policy();
        let row = checked_in_at(hm(9, 0));

        assert_eq!(p.evaluate_check_out(hm(17, 44), Some(&row)), CheckOutOutcome::TimeBlocked);
        assert_eq!(p.evaluate_check_out(hm(18, 0), None), CheckOutOutcome::NotCheckedIn);
        assert_eq!(
            p.evaluate_check_out(hm(18, 0), Some(&row)),
            CheckOutOutcome::CheckedOut { at: hm(18, 0) }
        );

        let mut done = row.clone();
        done.check_out = Some(hm(18, 0));
        assert_eq!(p.evaluate_check_out(hm(18, 30), Some(&done)), CheckOutOutcome::AlreadyCheckedOut);
    }
}
