//! Decides whether a proposed leave may be recorded.
//!
//! Checks run in a fixed order and the first failure is reported: notice
//! period, consecutive-day cap, blackouts, then the balance floor. Blackouts
//! that allow exceptions and deducting shutdowns never reject; they come back
//! as warnings on an accepted decision.

use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;
use utoipa::ToSchema;

use super::balance::LeaveBalance;
use super::calendar::{self, CalendarSegment};
use super::dates::DateRange;
use crate::error::ValidationError;
use crate::model::leave_policy::PolicyBundle;

/// Upper bound on one request: more business days than any policy year has.
pub const MAX_REQUEST_DAYS: u32 = 262;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeaveRequest {
    #[schema(example = "2026-11-02", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = 5, minimum = 1, maximum = 262)]
    pub days: u32,
}

impl LeaveRequest {
    /// Checks a client-supplied day count before anything is computed from it.
    pub fn new(start_date: NaiveDate, days: i64) -> Result<Self, ValidationError> {
        if days <= 0 {
            return Err(ValidationError::NonPositiveDays { days });
        }
        match u32::try_from(days) {
            Ok(count) if count <= MAX_REQUEST_DAYS => Ok(Self {
                start_date,
                days: count,
            }),
            _ => Err(ValidationError::DaysOutOfRange { days }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema, IntoStaticStr)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintViolation {
    NoticeViolation {
        #[schema(value_type = String, format = "date")]
        earliest_start: NaiveDate,
        min_notice_days: u32,
    },
    ConsecutiveDaysExceeded {
        requested: u32,
        max: u32,
    },
    BlackoutViolation {
        blackout_id: u64,
        reason: String,
    },
    InsufficientBalance {
        remaining: i32,
        requested: u32,
        floor: i32,
    },
}

impl ConstraintViolation {
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintViolation::NoticeViolation {
                earliest_start,
                min_notice_days,
            } => write!(
                f,
                "{min_notice_days} days notice required, earliest start is {earliest_start}"
            ),
            ConstraintViolation::ConsecutiveDaysExceeded { requested, max } => {
                write!(f, "{requested} consecutive days requested, at most {max} allowed")
            }
            ConstraintViolation::BlackoutViolation { reason, .. } => {
                write!(f, "overlaps blackout period: {reason}")
            }
            ConstraintViolation::InsufficientBalance {
                remaining,
                requested,
                floor,
            } => write!(
                f,
                "{requested} days requested with {remaining} remaining would go below {floor}"
            ),
        }
    }
}

/// Reasons an accepted request should still be looked at by HR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveWarning {
    BlackoutRequiresReview { blackout_id: u64, reason: String },
    OverlapsShutdown { shutdown_id: u64, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    Accepted {
        warnings: Vec<LeaveWarning>,
        segments: Vec<CalendarSegment>,
    },
    Rejected {
        violation: ConstraintViolation,
    },
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted { .. })
    }
}

/// Pure decision over already-loaded policy and balance. Nothing is recorded.
pub fn validate_request(
    request: &LeaveRequest,
    bundle: &PolicyBundle,
    balance: &LeaveBalance,
    today: NaiveDate,
) -> Result<Decision, ValidationError> {
    if request.days == 0 {
        return Err(ValidationError::NonPositiveDays { days: 0 });
    }
    if request.days > MAX_REQUEST_DAYS {
        return Err(ValidationError::DaysOutOfRange {
            days: i64::from(request.days),
        });
    }
    let policy = &bundle.policy;

    if let Some(min_notice_days) = policy.min_notice_days {
        // Notice past the end of the calendar: no start date is far enough out
        let earliest_start = today
            .checked_add_signed(Duration::days(i64::from(min_notice_days)))
            .unwrap_or(NaiveDate::MAX);
        if request.start_date < earliest_start {
            return Ok(Decision::Rejected {
                violation: ConstraintViolation::NoticeViolation {
                    earliest_start,
                    min_notice_days,
                },
            });
        }
    }

    if let Some(max) = policy.max_consecutive_days {
        if request.days > max {
            return Ok(Decision::Rejected {
                violation: ConstraintViolation::ConsecutiveDaysExceeded {
                    requested: request.days,
                    max,
                },
            });
        }
    }

    let segments = calendar::segment_business_days(request.start_date, i64::from(request.days));
    let touches = |range: &DateRange| {
        segments
            .iter()
            .any(|segment| segment.as_range().intersects(range))
    };

    let mut warnings = Vec::new();
    for blackout in bundle.blackouts.iter().filter(|b| touches(&b.range())) {
        if !blackout.allow_exceptions {
            return Ok(Decision::Rejected {
                violation: ConstraintViolation::BlackoutViolation {
                    blackout_id: blackout.id,
                    reason: blackout.reason.clone(),
                },
            });
        }
        warnings.push(LeaveWarning::BlackoutRequiresReview {
            blackout_id: blackout.id,
            reason: blackout.reason.clone(),
        });
    }

    let floor = policy.balance_floor();
    if i64::from(balance.remaining) - i64::from(request.days) < i64::from(floor) {
        return Ok(Decision::Rejected {
            violation: ConstraintViolation::InsufficientBalance {
                remaining: balance.remaining,
                requested: request.days,
                floor,
            },
        });
    }

    warnings.extend(
        bundle
            .deducting_shutdowns()
            .filter(|s| touches(&s.range()))
            .map(|s| LeaveWarning::OverlapsShutdown {
                shutdown_id: s.id,
                reason: s.reason.clone(),
            }),
    );

    tracing::debug!(
        start_date = %request.start_date,
        days = request.days,
        warnings = warnings.len(),
        "leave request accepted"
    );

    Ok(Decision::Accepted { warnings, segments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_policy::LeavePolicy;
    use crate::model::leave_policy::fixtures::{blackout, bundle, policy, shutdown};
    use rstest::rstest;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // Sat 2026-10-17
    fn today() -> NaiveDate {
        d(2026, 10, 17)
    }

    fn balance(remaining: i32) -> LeaveBalance {
        LeaveBalance {
            year: 2026,
            accrued: 22,
            carried_over: 0,
            taken: 22 - remaining,
            remaining,
        }
    }

    fn request(start_date: NaiveDate, days: u32) -> LeaveRequest {
        LeaveRequest { start_date, days }
    }

    fn rejected(decision: Decision) -> ConstraintViolation {
        match decision {
            Decision::Rejected { violation } => violation,
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn accepts_plain_request_with_segments() {
        let decision =
            validate_request(&request(today(), 3), &bundle(policy()), &balance(10), today()).unwrap();
        assert_eq!(
            decision,
            Decision::Accepted {
                warnings: vec![],
                segments: vec![CalendarSegment {
                    start: d(2026, 10, 19),
                    end_exclusive: d(2026, 10, 22),
                }],
            }
        );
    }

    #[test]
    fn non_positive_days_is_a_validation_error() {
        let err = validate_request(&request(today(), 0), &bundle(policy()), &balance(10), today())
            .unwrap_err();
        assert_eq!(err, ValidationError::NonPositiveDays { days: 0 });
    }

    #[test]
    fn oversized_request_is_a_validation_error() {
        let err = validate_request(
            &request(d(2026, 11, 2), 100_000_000),
            &bundle(policy()),
            &balance(22),
            today(),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::DaysOutOfRange { days: 100_000_000 });
    }

    #[test]
    fn longest_request_near_end_of_calendar_is_decided() {
        let start = NaiveDate::MAX - Duration::days(30);
        let decision = validate_request(
            &request(start, MAX_REQUEST_DAYS),
            &bundle(policy()),
            &balance(300),
            today(),
        )
        .unwrap();
        assert!(decision.is_accepted());
    }

    #[test]
    fn unreachable_notice_rejects_instead_of_overflowing() {
        let p = LeavePolicy {
            min_notice_days: Some(u32::MAX),
            ..policy()
        };
        let violation = rejected(
            validate_request(&request(d(2026, 11, 2), 1), &bundle(p), &balance(10), today()).unwrap(),
        );
        assert_eq!(violation.code(), "NOTICE_VIOLATION");
    }

    #[rstest]
    #[case(0, ValidationError::NonPositiveDays { days: 0 })]
    #[case(-3, ValidationError::NonPositiveDays { days: -3 })]
    #[case(263, ValidationError::DaysOutOfRange { days: 263 })]
    #[case(i64::MAX, ValidationError::DaysOutOfRange { days: i64::MAX })]
    fn request_days_are_bounded(#[case] days: i64, #[case] expected: ValidationError) {
        assert_eq!(LeaveRequest::new(today(), days), Err(expected));
    }

    #[test]
    fn request_accepts_a_full_year_of_business_days() {
        let request = LeaveRequest::new(today(), 262).unwrap();
        assert_eq!(request.days, MAX_REQUEST_DAYS);
    }

    #[test]
    fn short_notice_is_rejected_first() {
        let p = LeavePolicy {
            min_notice_days: Some(14),
            max_consecutive_days: Some(2),
            ..policy()
        };
        let violation = rejected(
            validate_request(&request(d(2026, 10, 26), 5), &bundle(p), &balance(0), today()).unwrap(),
        );
        assert_eq!(
            violation,
            ConstraintViolation::NoticeViolation {
                earliest_start: d(2026, 10, 31),
                min_notice_days: 14,
            }
        );
    }

    #[test]
    fn notice_boundary_is_accepted() {
        let p = LeavePolicy {
            min_notice_days: Some(14),
            ..policy()
        };
        let decision =
            validate_request(&request(d(2026, 10, 31), 1), &bundle(p), &balance(5), today()).unwrap();
        assert!(decision.is_accepted());
    }

    #[test]
    fn consecutive_cap_ignores_balance() {
        let p = LeavePolicy {
            max_consecutive_days: Some(10),
            ..policy()
        };
        let violation = rejected(
            validate_request(&request(d(2026, 11, 2), 11), &bundle(p), &balance(50), today()).unwrap(),
        );
        assert_eq!(
            violation,
            ConstraintViolation::ConsecutiveDaysExceeded {
                requested: 11,
                max: 10
            }
        );
        assert_eq!(violation.code(), "CONSECUTIVE_DAYS_EXCEEDED");
    }

    #[test]
    fn hard_blackout_rejects() {
        let mut b = bundle(policy());
        b.blackouts
            .push(blackout(4, d(2026, 12, 14), d(2026, 12, 23), false));
        let violation = rejected(
            validate_request(&request(d(2026, 12, 10), 3), &b, &balance(10), today()).unwrap(),
        );
        assert!(matches!(
            violation,
            ConstraintViolation::BlackoutViolation { blackout_id: 4, .. }
        ));
    }

    #[test]
    fn blackout_in_skipped_weekend_does_not_count() {
        let mut b = bundle(policy());
        // Sat-Sun 2026-11-07..08 sits between the two segments
        b.blackouts
            .push(blackout(5, d(2026, 11, 7), d(2026, 11, 8), false));
        let decision =
            validate_request(&request(d(2026, 11, 5), 4), &b, &balance(10), today()).unwrap();
        assert!(decision.is_accepted());
    }

    #[test]
    fn soft_blackout_warns() {
        let mut b = bundle(policy());
        b.blackouts
            .push(blackout(6, d(2026, 12, 14), d(2026, 12, 23), true));
        match validate_request(&request(d(2026, 12, 21), 2), &b, &balance(10), today()).unwrap() {
            Decision::Accepted { warnings, .. } => assert_eq!(
                warnings,
                vec![LeaveWarning::BlackoutRequiresReview {
                    blackout_id: 6,
                    reason: "blackout 6".to_string()
                }]
            ),
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[test]
    fn deducting_shutdown_overlap_warns() {
        let mut b = bundle(policy());
        b.shutdowns
            .push(shutdown(2, d(2026, 12, 24), d(2026, 12, 31), 6, true));
        b.shutdowns
            .push(shutdown(3, d(2026, 12, 24), d(2026, 12, 31), 6, false));
        match validate_request(&request(d(2026, 12, 22), 3), &b, &balance(10), today()).unwrap() {
            Decision::Accepted { warnings, .. } => {
                assert_eq!(warnings.len(), 1);
                assert!(matches!(
                    warnings[0],
                    LeaveWarning::OverlapsShutdown { shutdown_id: 2, .. }
                ));
            }
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[test]
    fn balance_floor_boundary() {
        let p = LeavePolicy {
            max_negative_balance: -3,
            ..policy()
        };
        let b = bundle(p);
        let start = d(2026, 11, 2);

        // 2 - 5 == -3 is exactly the floor
        assert!(validate_request(&request(start, 5), &b, &balance(2), today())
            .unwrap()
            .is_accepted());

        let violation = rejected(validate_request(&request(start, 6), &b, &balance(2), today()).unwrap());
        assert_eq!(
            violation,
            ConstraintViolation::InsufficientBalance {
                remaining: 2,
                requested: 6,
                floor: -3,
            }
        );
    }

    #[test]
    fn zero_floor_forbids_any_negative_result() {
        let b = bundle(policy());
        let start = d(2026, 11, 2);
        assert!(validate_request(&request(start, 4), &b, &balance(4), today())
            .unwrap()
            .is_accepted());
        assert!(!validate_request(&request(start, 5), &b, &balance(4), today())
            .unwrap()
            .is_accepted());
    }

    #[test]
    fn blackout_is_checked_before_balance() {
        let mut b = bundle(policy());
        b.blackouts
            .push(blackout(7, d(2026, 11, 2), d(2026, 11, 2), false));
        let violation = rejected(
            validate_request(&request(d(2026, 11, 2), 30), &b, &balance(0), today()).unwrap(),
        );
        assert_eq!(violation.code(), "BLACKOUT_VIOLATION");
    }
}
