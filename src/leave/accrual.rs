//! Entitlement earned by an employee in the policy year of a reference date.

use chrono::{Datelike, NaiveDate};

use super::dates;
use crate::model::leave_policy::{AccrualMethod, LeavePolicy};

/// Completed years of service at `reference`.
pub fn seniority_years(hired_at: NaiveDate, reference: NaiveDate) -> u32 {
    dates::full_years_between(hired_at, reference)
}

/// Base days plus the seniority bonus, before accrual is applied.
pub fn annual_entitlement(policy: &LeavePolicy, years: u32) -> u32 {
    let steps = years.checked_div(policy.seniority_step_years).unwrap_or(0);
    policy.base_annual_days + steps * policy.bonus_per_step
}

/// Days earned so far in the policy year containing `reference`.
pub fn entitled_days(hired_at: NaiveDate, policy: &LeavePolicy, reference: NaiveDate) -> u32 {
    let years = seniority_years(hired_at, reference);
    let base = u64::from(annual_entitlement(policy, years));
    let year = reference.year();
    let year_length = u64::from(dates::days_in_year(year));

    let (numerator, denominator) = match policy.accrual_method {
        AccrualMethod::AtYearStart => return base as u32,
        AccrualMethod::Daily => {
            let elapsed = reference.ordinal() as u64;
            (base * elapsed, year_length)
        }
        AccrualMethod::Monthly => (base * completed_months(reference), 12),
        AccrualMethod::ProRata => {
            let accrual_start = dates::first_day_of_year(year).map_or(hired_at, |jan1| hired_at.max(jan1));
            let elapsed = if accrual_start > reference {
                0
            } else {
                ((reference - accrual_start).num_days() + 1) as u64
            };
            (base * elapsed, year_length)
        }
    };

    policy.rounding_method.apply(numerator, denominator)
}

/// Months of the year fully behind `reference`; the current month counts
/// once its last day is reached.
fn completed_months(reference: NaiveDate) -> u64 {
    let before = u64::from(reference.month0());
    if reference == dates::last_day_of_month(reference) {
        before + 1
    } else {
        before
    }
}
