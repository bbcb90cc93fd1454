//! Approval ledger state machine and regularisation audit.
//!
//! Requests start `Pending` and move exactly once to `Approved`, `Rejected`
//! or `Overridden`. The functions here decide whether a transition is legal
//! and what it writes; the handlers persist the result.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::model::approval::{ApprovalPayload, ApprovalRequest, ApprovalStatus, RegularisationPayload};
use crate::model::attendance::{AttendanceRecord, AttendanceState, AttendanceStatus, AuditSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// What a terminal transition writes onto the request.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub status: ApprovalStatus,
    pub decided_by: u64,
    pub decided_at: NaiveDateTime,
    pub rejection_reason: Option<String>,
}

impl Resolution {
    pub fn apply_to(&self, request: &mut ApprovalRequest) {
        request.status = self.status;
        request.approved_by = Some(self.decided_by);
        request.approved_at = Some(self.decided_at);
        request.rejection_reason = self.rejection_reason.clone();
    }
}

/// Longest leave one request may cover, both ends included.
pub const MAX_LEAVE_DAYS: i64 = 366;

/// Kind-specific checks run on submission.
pub fn validate_submission(payload: &ApprovalPayload, today: NaiveDate, lookback_days: i64) -> AppResult<()> {
    match payload {
        ApprovalPayload::Leave(p) => {
            if p.leave_type.trim().is_empty() {
                return Err(AppError::validation("leave_type is required"));
            }
            if p.from_date > p.to_date {
                return Err(AppError::validation("from_date cannot be after to_date"));
            }
            if (p.to_date - p.from_date).num_days() + 1 > MAX_LEAVE_DAYS {
                return Err(AppError::validation(format!(
                    "A leave request can cover at most {MAX_LEAVE_DAYS} days"
                )));
            }
        }
        ApprovalPayload::Regularisation(p) => {
            if p.reason.trim().is_empty() {
                return Err(AppError::validation("A reason is required for regularisation"));
            }
            if p.date > today {
                return Err(AppError::validation("Future dates cannot be regularised"));
            }
            if today - p.date > Duration::days(lookback_days) {
                return Err(AppError::validation(format!(
                    "Regularisation allowed only for the last {lookback_days} days"
                )));
            }
        }
        ApprovalPayload::Reimbursement(p) => {
            if p.category.trim().is_empty() {
                return Err(AppError::validation("category is required"));
            }
            if !(p.amount.is_finite() && p.amount > 0.0) {
                return Err(AppError::validation("amount must be greater than zero"));
            }
        }
        ApprovalPayload::Remuneration(p) => {
            if p.remuneration_type.trim().is_empty() {
                return Err(AppError::validation("remuneration_type is required"));
            }
            if !(p.amount.is_finite() && p.amount > 0.0) {
                return Err(AppError::validation("amount must be greater than zero"));
            }
            if NaiveDate::parse_from_str(&format!("{}-01", p.month.trim()), "%Y-%m-%d").is_err() {
                return Err(AppError::validation("month must be YYYY-MM"));
            }
        }
    }
    Ok(())
}

/// Pins the submission snapshot: `current` comes from what is stored for
/// that day, `requested` is always a Present day.
pub fn capture_regularisation(payload: &mut RegularisationPayload, existing: Option<&AttendanceRecord>) {
    payload.current = existing.map(AttendanceRecord::state).unwrap_or_else(AttendanceState::absent);
    payload.requested.status = AttendanceStatus::Present;
}

/// Approve or reject a pending request on behalf of `actor`.
pub fn decide(
    request: &ApprovalRequest,
    actor: u64,
    decision: Decision,
    reason: Option<&str>,
    now: NaiveDateTime,
) -> AppResult<Resolution> {
    if request.status.is_terminal() {
        return Err(AppError::conflict(format!(
            "Approval {} already decided ({})",
            request.id, request.status
        )));
    }
    if request.assigned_to != actor {
        return Err(AppError::forbidden("Only the assigned approver can decide this request"));
    }

    // blank means missing; anything else is stored as sent
    let reason = reason.filter(|r| !r.trim().is_empty());

    match decision {
        Decision::Approve => Ok(Resolution {
            status: ApprovalStatus::Approved,
            decided_by: actor,
            decided_at: now,
            rejection_reason: None,
        }),
        Decision::Reject => {
            let reason = reason.ok_or_else(|| AppError::validation("A reason is required to reject"))?;
            Ok(Resolution {
                status: ApprovalStatus::Rejected,
                decided_by: actor,
                decided_at: now,
                rejection_reason: Some(reason.to_string()),
            })
        }
    }
}

/// Admin override of a pending request. Authorisation is the caller's job.
pub fn override_request(request: &ApprovalRequest, admin: u64, now: NaiveDateTime) -> AppResult<Resolution> {
    if request.status.is_terminal() {
        return Err(AppError::conflict(format!(
            "Approval {} already decided ({})",
            request.id, request.status
        )));
    }
    Ok(Resolution {
        status: ApprovalStatus::Overridden,
        decided_by: admin,
        decided_at: now,
        rejection_reason: None,
    })
}

/// The attendance day as it must look after an approved regularisation.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularisedDay {
    pub after: AttendanceState,
    pub audit: AuditSnapshot,
}

/// Status is forced to Present; requested punches win, otherwise the
/// recorded ones are kept.
pub fn regularise(
    payload: &RegularisationPayload,
    existing: Option<&AttendanceRecord>,
    approver: u64,
    approved_at: NaiveDateTime,
) -> RegularisedDay {
    let before = existing.map(AttendanceRecord::state).unwrap_or_else(AttendanceState::absent);
    let after = AttendanceState {
        status: AttendanceStatus::Present,
        check_in: payload.requested.check_in.or(before.check_in),
        check_out: payload.requested.check_out.or(before.check_out),
    };

    let audit = AuditSnapshot {
        date: payload.date,
        current: payload.current.clone(),
        requested: payload.requested.clone(),
        reason: payload.reason.clone(),
        before: Some(before),
        after: Some(after.clone()),
        approved_by: Some(approver),
        approved_at: Some(approved_at),
    };

    RegularisedDay { after, audit }
}

/// Stable sort by `created_at`; ties keep insertion (id) order.
pub fn sort_requests(requests: &mut [ApprovalRequest], order: SortOrder) {
    requests.sort_by_key(|r| r.id);
    match order {
        SortOrder::Asc => requests.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortOrder::Desc => requests.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::approval::{ApprovalKind, LeavePayload, ReimbursementPayload, RemunerationPayload};
    use crate::model::attendance::DayType;
    use chrono::NaiveTime;

    fn d(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn at(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn leave_request(id: u64, created: &str) -> ApprovalRequest {
        ApprovalRequest {
            id,
            employee_id: 5,
            employee_name: None,
            kind: ApprovalKind::Leave,
            payload: ApprovalPayload::Leave(LeavePayload {
                leave_type: "sick".into(),
                from_date: d("2024-06-10"),
                to_date: d("2024-06-12"),
                reason: "flu".into(),
            }),
            assigned_to: 1,
            status: ApprovalStatus::Pending,
            created_at: at(created),
            approved_at: None,
            approved_by: None,
            approver_name: None,
            rejection_reason: None,
        }
    }

    fn regularisation(date: &str, requested: AttendanceState) -> RegularisationPayload {
        RegularisationPayload {
            date: d(date),
            current: AttendanceState::present(),
            requested,
            reason: "forgot to punch".into(),
        }
    }

    #[test]
    fn approve_records_actor_and_time() {
        let req = leave_request(1, "2024-06-09 10:00:00");
        let now = at("2024-06-09 12:00:00");
        let res = decide(&req, 1, Decision::Approve, None, now).unwrap();
        assert_eq!(res.status, ApprovalStatus::Approved);
        assert_eq!(res.decided_by, 1);
        assert_eq!(res.decided_at, now);
        assert_eq!(res.rejection_reason, None);
    }

    #[test]
    fn reject_requires_reason() {
        let req = leave_request(1, "2024-06-09 10:00:00");
        let now = at("2024-06-09 12:00:00");

        for missing in [None, Some(""), Some("   ")] {
            let err = decide(&req, 1, Decision::Reject, missing, now).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{missing:?}");
        }

        let res = decide(&req, 1, Decision::Reject, Some("insufficient notice"), now).unwrap();
        assert_eq!(res.status, ApprovalStatus::Rejected);
        assert_eq!(res.rejection_reason.as_deref(), Some("insufficient notice"));
        assert_eq!(res.decided_by, 1);

        let padded = decide(&req, 1, Decision::Reject, Some("  insufficient notice\n"), now).unwrap();
        assert_eq!(padded.rejection_reason.as_deref(), Some("  insufficient notice\n"));
    }

    #[test]
    fn terminal_states_never_move() {
        let now = at("2024-06-09 12:00:00");
        for status in [ApprovalStatus::Approved, ApprovalStatus::Rejected, ApprovalStatus::Overridden] {
            let mut req = leave_request(1, "2024-06-09 10:00:00");
            req.status = status;
            for decision in [Decision::Approve, Decision::Reject] {
                let err = decide(&req, 1, decision, Some("again"), now).unwrap_err();
                assert!(matches!(err, AppError::Conflict(_)));
            }
            assert!(matches!(override_request(&req, 1, now), Err(AppError::Conflict(_))));
        }
    }

    #[test]
    fn only_assigned_approver_decides() {
        let req = leave_request(1, "2024-06-09 10:00:00");
        let err = decide(&req, 2, Decision::Approve, None, at("2024-06-09 12:00:00")).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn resolution_applies_to_request() {
        let mut req = leave_request(1, "2024-06-09 10:00:00");
        let res = override_request(&req, 9, at("2024-06-09 12:00:00")).unwrap();
        res.apply_to(&mut req);
        assert_eq!(req.status, ApprovalStatus::Overridden);
        assert_eq!(req.approved_by, Some(9));
        assert!(req.status.is_effectively_approved());
    }

    #[test]
    fn capture_uses_stored_day_or_absent() {
        let mut p = regularisation("2024-06-11", AttendanceState::absent());
        capture_regularisation(&mut p, None);
        assert_eq!(p.current, AttendanceState::absent());
        assert_eq!(p.requested.status, AttendanceStatus::Present);
    }

    #[test]
    fn regularising_an_absent_day_makes_it_present() {
        let mut p = regularisation(
            "2024-06-11",
            AttendanceState {
                status: AttendanceStatus::Present,
                check_in: Some(hm(9, 30)),
                check_out: Some(hm(18, 0)),
            },
        );
        capture_regularisation(&mut p, None);

        let day = regularise(&p, None, 1, at("2024-06-12 09:00:00"));
        assert_eq!(day.after.status, AttendanceStatus::Present);
        assert_eq!(day.after.check_in, Some(hm(9, 30)));
        assert_eq!(day.audit.before, Some(AttendanceState::absent()));
        assert_eq!(day.audit.date, p.date);
        assert_eq!(day.audit.approved_by, Some(1));
    }

    #[test]
    fn regularise_keeps_recorded_punches_when_none_requested() {
        let existing = AttendanceRecord {
            id: 3,
            employee_id: 5,
            date: d("2024-06-11"),
            check_in: Some(hm(10, 50)),
            check_out: None,
            latitude: None,
            longitude: None,
            distance_m: None,
            status: AttendanceStatus::Present,
            day_type: DayType::Half,
            late_comment: Some("traffic".into()),
            regularised: false,
            audit: None,
        };
        let mut p = regularisation("2024-06-11", AttendanceState::present());
        capture_regularisation(&mut p, Some(&existing));

        let day = regularise(&p, Some(&existing), 1, at("2024-06-12 09:00:00"));
        assert_eq!(day.after.check_in, Some(hm(10, 50)));
        assert_eq!(day.audit.current.check_in, Some(hm(10, 50)));
    }

    #[test]
    fn submission_rules() {
        let today = d("2024-06-12");

        let backwards = ApprovalPayload::Leave(LeavePayload {
            leave_type: "annual".into(),
            from_date: d("2024-06-14"),
            to_date: d("2024-06-13"),
            reason: String::new(),
        });
        assert!(validate_submission(&backwards, today, 7).is_err());

        let future = ApprovalPayload::Regularisation(regularisation("2024-06-13", AttendanceState::present()));
        assert!(validate_submission(&future, today, 7).is_err());

        let too_old = ApprovalPayload::Regularisation(regularisation("2024-06-01", AttendanceState::present()));
        assert!(validate_submission(&too_old, today, 7).is_err());

        let fine = ApprovalPayload::Regularisation(regularisation("2024-06-05", AttendanceState::present()));
        assert!(validate_submission(&fine, today, 7).is_ok());

        let bad_month = ApprovalPayload::Remuneration(RemunerationPayload {
            remuneration_type: "bonus".into(),
            amount: 10.0,
            month: "June".into(),
            reason: String::new(),
        });
        assert!(validate_submission(&bad_month, today, 7).is_err());
    }

    fn leave(leave_type: &str, from: &str, to: &str) -> ApprovalPayload {
        ApprovalPayload::Leave(LeavePayload {
            leave_type: leave_type.into(),
            from_date: d(from),
            to_date: d(to),
            reason: String::new(),
        })
    }

    fn reimbursement(category: &str, amount: f64) -> ApprovalPayload {
        ApprovalPayload::Reimbursement(ReimbursementPayload {
            category: category.into(),
            amount,
            description: String::new(),
            bill: None,
        })
    }

    fn remuneration(amount: f64) -> ApprovalPayload {
        ApprovalPayload::Remuneration(RemunerationPayload {
            remuneration_type: "bonus".into(),
            amount,
            month: "2024-06".into(),
            reason: String::new(),
        })
    }

    fn rejected(payload: &ApprovalPayload) -> bool {
        matches!(
            validate_submission(payload, d("2024-06-12"), 7),
            Err(AppError::Validation(_))
        )
    }

    #[test]
    fn leave_needs_a_type_and_a_bounded_range() {
        assert!(rejected(&leave("", "2024-06-10", "2024-06-12")));
        assert!(rejected(&leave("   ", "2024-06-10", "2024-06-12")));
        assert!(!rejected(&leave("sick", "2024-06-10", "2024-06-10")));

        // 366 days inclusive is the longest accepted span
        assert!(!rejected(&leave("sabbatical", "2024-01-01", "2024-12-31")));
        assert!(rejected(&leave("sabbatical", "2024-01-01", "2025-01-01")));
        assert!(rejected(&leave("forever", "0001-01-01", "9999-12-31")));
    }

    #[test]
    fn money_requests_need_a_positive_finite_amount() {
        for amount in [0.0, -1.0, -0.01, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(rejected(&reimbursement("travel", amount)), "reimbursement {amount}");
            assert!(rejected(&remuneration(amount)), "remuneration {amount}");
        }
        assert!(!rejected(&reimbursement("travel", 1250.0)));
        assert!(!rejected(&remuneration(0.5)));
    }

    #[test]
    fn reimbursement_needs_a_category() {
        assert!(rejected(&reimbursement("", 10.0)));
        assert!(rejected(&reimbursement("  ", 10.0)));
    }

    #[test]
    fn sort_is_stable_on_equal_timestamps() {
        let mut list = vec![
            leave_request(3, "2024-06-09 10:00:00"),
            leave_request(1, "2024-06-09 10:00:00"),
            leave_request(2, "2024-06-10 08:00:00"),
        ];

        sort_requests(&mut list, SortOrder::Desc);
        assert_eq!(list.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 1, 3]);

        sort_requests(&mut list, SortOrder::Asc);
        assert_eq!(list.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3, 2]);
    }
}
