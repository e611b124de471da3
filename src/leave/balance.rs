use std::cmp::Ordering;
use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use super::accrual;
use super::dates::{self, DateRange};
use crate::error::ValidationError;
use crate::model::leave::Leave;
use crate::model::leave_policy::{CompanyShutdown, LeavePolicy};

/// Derived per employee per policy year, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[schema(example = json!({
    "year": 2026,
    "accrued": 22,
    "carried_over": 3,
    "taken": 15,
    "remaining": 10
}))]
pub struct LeaveBalance {
    pub year: i32,
    pub accrued: u32,
    pub carried_over: i32,
    pub taken: i32,
    /// `accrued + carried_over - taken`; negative when the policy allows it.
    pub remaining: i32,
}

/// Everything one policy year's balance depends on.
#[derive(Debug, Clone, Copy)]
pub struct BalanceInputs<'a> {
    pub hired_at: NaiveDate,
    pub policy: &'a LeavePolicy,
    pub leaves: &'a [Leave],
    pub shutdowns: &'a [CompanyShutdown],
    pub prior_year_remaining: Option<i32>,
    pub reference: NaiveDate,
}

pub fn compute_balance(inputs: &BalanceInputs<'_>) -> LeaveBalance {
    let year = inputs.reference.year();
    let accrued = accrual::entitled_days(inputs.hired_at, inputs.policy, inputs.reference);
    let carried_over = carried_over(
        inputs.policy,
        inputs.prior_year_remaining,
        inputs.reference,
    );
    let taken = taken_days(year, inputs.leaves, inputs.shutdowns);

    LeaveBalance {
        year,
        accrued,
        carried_over,
        taken,
        remaining: accrued as i32 + carried_over - taken,
    }
}

/// Unused prior-year days allowed into the year of `reference`.
pub fn carried_over(policy: &LeavePolicy, prior_year_remaining: Option<i32>, reference: NaiveDate) -> i32 {
    if !policy.allow_carryover {
        return 0;
    }
    if let Some(expiry) = policy.carryover_expiry(reference.year()) {
        if reference > expiry {
            return 0;
        }
    }

    let unused = prior_year_remaining.unwrap_or(0).max(0);
    match policy.max_carryover_days {
        Some(cap) => unused.min(cap as i32),
        None => unused,
    }
}

/// Leave starting inside the policy year plus every deducting shutdown that
/// overlaps it.
pub fn taken_days(year: i32, leaves: &[Leave], shutdowns: &[CompanyShutdown]) -> i32 {
    let Some(policy_year) = dates::policy_year(year) else {
        return 0;
    };

    let leave_days: u32 = leaves
        .iter()
        .filter(|leave| policy_year.contains(leave.start_date))
        .map(|leave| leave.days)
        .sum();

    let shutdown_days: u32 = shutdowns
        .iter()
        .filter(|s| s.deduct_from_allowance && deducts_in(s, &policy_year))
        .map(|s| s.days)
        .sum();

    (leave_days + shutdown_days) as i32
}

fn deducts_in(shutdown: &CompanyShutdown, year: &DateRange) -> bool {
    shutdown.range().intersects(year)
}

/// Balance for the year of `reference`, rolling carryover forward from the
/// hire year. Earlier years are evaluated at their Dec 31.
pub fn balance_for_year(
    hired_at: NaiveDate,
    policy: &LeavePolicy,
    leaves: &[Leave],
    shutdowns: &[CompanyShutdown],
    reference: NaiveDate,
) -> LeaveBalance {
    let target = reference.year();
    let first = hired_at.year().min(target);

    let mut prior_year_remaining = None;
    for closed_at in (first..target).filter_map(dates::last_day_of_year) {
        let closed = compute_balance(&BalanceInputs {
            hired_at,
            policy,
            leaves,
            shutdowns,
            prior_year_remaining,
            reference: closed_at,
        });
        prior_year_remaining = Some(closed.remaining);
    }

    compute_balance(&BalanceInputs {
        hired_at,
        policy,
        leaves,
        shutdowns,
        prior_year_remaining,
        reference,
    })
}

/// Date a balance for `year` is evaluated at: today for the current year,
/// Jan 1 for a future year and Dec 31 for a closed one.
pub fn reference_date_for(year: i32, today: NaiveDate) -> Option<NaiveDate> {
    match year.cmp(&today.year()) {
        Ordering::Equal => Some(today),
        Ordering::Greater => dates::first_day_of_year(year),
        Ordering::Less => dates::last_day_of_year(year),
    }
}

/// Years a balance can be asked for: from the hire year (or the current one
/// for a future hire) through next year.
pub fn balance_years(hired_at: NaiveDate, today: NaiveDate) -> RangeInclusive<i32> {
    hired_at.year().min(today.year())..=today.year() + 1
}

/// Reference date for `year`, refusing years outside `balance_years`.
pub fn checked_reference_date(
    year: i32,
    hired_at: NaiveDate,
    today: NaiveDate,
) -> Result<NaiveDate, ValidationError> {
    let window = balance_years(hired_at, today);
    let out_of_range = || ValidationError::YearOutOfRange {
        year,
        earliest: *window.start(),
        latest: *window.end(),
    };

    if !window.contains(&year) {
        return Err(out_of_range());
    }
    reference_date_for(year, today).ok_or_else(out_of_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_policy::fixtures::{policy, shutdown};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn leave(id: u64, start: NaiveDate, days: u32) -> Leave {
        Leave {
            id,
            employee_id: 1,
            start_date: start,
            days,
            note: None,
            created_at: None,
        }
    }

    fn carryover_policy(cap: Option<u32>) -> LeavePolicy {
        LeavePolicy {
            allow_carryover: true,
            max_carryover_days: cap,
            carryover_expiry_month: Some(3),
            carryover_expiry_day: Some(31),
            ..policy()
        }
    }

    #[test]
    fn remaining_is_accrued_minus_taken() {
        let p = policy();
        let leaves = vec![leave(1, d(2026, 2, 2), 5), leave(2, d(2026, 6, 8), 3)];
        let balance = compute_balance(&BalanceInputs {
            hired_at: d(2019, 1, 10),
            policy: &p,
            leaves: &leaves,
            shutdowns: &[],
            prior_year_remaining: None,
            reference: d(2026, 10, 17),
        });

        assert_eq!(
            balance,
            LeaveBalance {
                year: 2026,
                accrued: 22,
                carried_over: 0,
                taken: 8,
                remaining: 14,
            }
        );
    }

    #[test]
    fn each_leave_and_deducting_shutdown_lowers_remaining() {
        let p = policy();
        let hired = d(2020, 5, 1);
        let reference = d(2026, 10, 17);
        let mut leaves = Vec::new();
        let mut shutdowns = Vec::new();

        let base = balance_for_year(hired, &p, &leaves, &shutdowns, reference).remaining;

        leaves.push(leave(1, d(2026, 3, 2), 4));
        let after_leave = balance_for_year(hired, &p, &leaves, &shutdowns, reference).remaining;
        assert_eq!(after_leave, base - 4);

        shutdowns.push(shutdown(1, d(2026, 8, 10), d(2026, 8, 14), 5, true));
        let after_shutdown = balance_for_year(hired, &p, &leaves, &shutdowns, reference).remaining;
        assert_eq!(after_shutdown, after_leave - 5);

        shutdowns.push(shutdown(2, d(2026, 12, 24), d(2026, 12, 24), 1, false));
        let ignored = balance_for_year(hired, &p, &leaves, &shutdowns, reference).remaining;
        assert_eq!(ignored, after_shutdown);
    }

    #[test]
    fn leave_counts_in_year_it_starts() {
        let leaves = vec![leave(1, d(2026, 12, 28), 5)];
        assert_eq!(taken_days(2026, &leaves, &[]), 5);
        assert_eq!(taken_days(2027, &leaves, &[]), 0);
    }

    #[test]
    fn remaining_may_go_negative() {
        let p = policy();
        let leaves = vec![leave(1, d(2026, 1, 5), 20), leave(2, d(2026, 3, 2), 5)];
        let balance = balance_for_year(d(2025, 6, 1), &p, &leaves, &[], d(2026, 4, 1));
        assert_eq!(balance.remaining, -4);
    }

    #[test]
    fn carryover_is_capped() {
        let p = carryover_policy(Some(5));
        assert_eq!(carried_over(&p, Some(9), d(2026, 2, 1)), 5);
        assert_eq!(carried_over(&p, Some(3), d(2026, 2, 1)), 3);
        assert_eq!(carried_over(&p, Some(-2), d(2026, 2, 1)), 0);
        assert_eq!(carried_over(&p, None, d(2026, 2, 1)), 0);
    }

    #[test]
    fn carryover_expires_after_cutoff() {
        let p = carryover_policy(None);
        assert_eq!(carried_over(&p, Some(4), d(2026, 3, 31)), 4);
        assert_eq!(carried_over(&p, Some(4), d(2026, 4, 1)), 0);
    }

    #[test]
    fn carryover_disabled_by_policy() {
        let p = policy();
        assert_eq!(carried_over(&p, Some(10), d(2026, 1, 2)), 0);
    }

    #[test]
    fn rolls_prior_year_remaining_forward() {
        let p = carryover_policy(Some(5));
        // 2025: 21 days, 14 taken, 7 unused -> capped at 5
        let leaves = vec![leave(1, d(2025, 4, 7), 14), leave(2, d(2026, 2, 2), 2)];
        let balance = balance_for_year(d(2024, 11, 1), &p, &leaves, &[], d(2026, 3, 1));

        assert_eq!(balance.carried_over, 5);
        assert_eq!(balance.taken, 2);
        assert_eq!(balance.remaining, 21 + 5 - 2);
    }

    #[test]
    fn hire_year_balance_has_no_carryover() {
        let p = carryover_policy(None);
        let balance = balance_for_year(d(2026, 2, 1), &p, &[], &[], d(2026, 2, 15));
        assert_eq!(balance.carried_over, 0);
        assert_eq!(balance.accrued, 21);
    }

    #[test]
    fn shutdown_across_new_year_deducts_in_both_years() {
        let shutdowns = vec![shutdown(1, d(2026, 12, 28), d(2027, 1, 2), 5, true)];
        assert_eq!(taken_days(2026, &[], &shutdowns), 5);
        assert_eq!(taken_days(2027, &[], &shutdowns), 5);
        assert_eq!(taken_days(2028, &[], &shutdowns), 0);
    }

    #[test]
    fn reference_date_depends_on_year() {
        let today = d(2026, 10, 17);
        assert_eq!(reference_date_for(2026, today), Some(today));
        assert_eq!(reference_date_for(2027, today), Some(d(2027, 1, 1)));
        assert_eq!(reference_date_for(2025, today), Some(d(2025, 12, 31)));
        assert_eq!(reference_date_for(300_000, today), None);
    }

    #[test]
    fn balance_year_must_fall_between_hire_and_next_year() {
        let today = d(2026, 10, 17);
        let hired = d(2019, 1, 10);

        assert_eq!(checked_reference_date(2019, hired, today), Ok(d(2019, 12, 31)));
        assert_eq!(checked_reference_date(2027, hired, today), Ok(d(2027, 1, 1)));
        for year in [2018, 2028, 262_000, 300_000, -300_000] {
            assert_eq!(
                checked_reference_date(year, hired, today),
                Err(ValidationError::YearOutOfRange {
                    year,
                    earliest: 2019,
                    latest: 2027,
                })
            );
        }
    }

    #[test]
    fn future_hire_can_still_see_current_year() {
        let today = d(2026, 10, 17);
        assert_eq!(balance_years(d(2027, 3, 1), today), 2026..=2027);
    }
}
