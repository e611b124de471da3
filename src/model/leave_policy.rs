use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::ValidationError;
use crate::leave::dates::{self, DateRange};

/// How entitlement becomes available over the policy year.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AccrualMethod {
    Daily,
    Monthly,
    AtYearStart,
    ProRata,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundingMethod {
    Floor,
    Ceil,
    Round,
}

impl RoundingMethod {
    /// Rounds `numerator / denominator` without going through floats.
    /// `Round` is half-up.
    pub fn apply(self, numerator: u64, denominator: u64) -> u32 {
        if denominator == 0 {
            return 0;
        }
        let value = match self {
            RoundingMethod::Floor => numerator / denominator,
            RoundingMethod::Ceil => numerator.div_ceil(denominator),
            RoundingMethod::Round => (2 * numerator + denominator) / (2 * denominator),
        };
        value as u32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "is_company_default": true,
    "base_annual_days": 21,
    "seniority_step_years": 5,
    "bonus_per_step": 1,
    "accrual_method": "AT_YEAR_START",
    "rounding_method": "FLOOR",
    "allow_carryover": true,
    "max_carryover_days": 5,
    "carryover_expiry_month": 3,
    "carryover_expiry_day": 31,
    "max_negative_balance": 0,
    "max_consecutive_days": 15,
    "min_notice_days": 7,
    "active": true
}))]
pub struct LeavePolicy {
    pub id: u64,
    pub is_company_default: bool,
    pub base_annual_days: u32,
    pub seniority_step_years: u32,
    pub bonus_per_step: u32,
    pub accrual_method: AccrualMethod,
    pub rounding_method: RoundingMethod,
    pub allow_carryover: bool,
    pub max_carryover_days: Option<u32>,
    pub carryover_expiry_month: Option<u32>,
    pub carryover_expiry_day: Option<u32>,
    /// Lowest balance a request may leave behind, as a value <= 0.
    pub max_negative_balance: i32,
    pub max_consecutive_days: Option<u32>,
    pub min_notice_days: Option<u32>,
    pub active: bool,
}

impl LeavePolicy {
    /// Save-time checks. The calculators assume a policy that passed these.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.seniority_step_years == 0 {
            return Err(ValidationError::invalid_policy(
                "seniority_step_years",
                "must be greater than zero",
            ));
        }
        if self.max_negative_balance > 0 {
            return Err(ValidationError::invalid_policy(
                "max_negative_balance",
                "must be zero or negative",
            ));
        }
        if self.max_consecutive_days == Some(0) {
            return Err(ValidationError::invalid_policy(
                "max_consecutive_days",
                "must be greater than zero when set",
            ));
        }
        match (self.carryover_expiry_month, self.carryover_expiry_day) {
            (None, None) => {}
            (Some(month), Some(day)) => {
                // 2000 is a leap year, so Feb 29 passes here
                if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
                    return Err(ValidationError::invalid_policy(
                        "carryover_expiry_day",
                        "month and day do not form a calendar date",
                    ));
                }
            }
            _ => {
                return Err(ValidationError::invalid_policy(
                    "carryover_expiry_month",
                    "expiry month and day must be set together",
                ));
            }
        }
        Ok(())
    }

    /// Date in `year` after which carried-over days are forfeited.
    pub fn carryover_expiry(&self, year: i32) -> Option<NaiveDate> {
        let month = self.carryover_expiry_month?;
        let day = self.carryover_expiry_day?;
        dates::month_day_in_year(year, month, day)
    }

    /// Balance floor expressed as a non-positive number.
    pub fn balance_floor(&self) -> i32 {
        -self.max_negative_balance.abs()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct BlackoutPeriod {
    #[schema(example = 3)]
    pub id: u64,
    #[schema(example = 1)]
    pub policy_id: u64,
    #[schema(example = "2026-12-14", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-12-23", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Year-end site handover")]
    pub reason: String,
    pub allow_exceptions: bool,
}

impl BlackoutPeriod {
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        DateRange::new(self.start_date, self.end_date)?;
        if self.reason.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "reason" });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct CompanyShutdown {
    #[schema(example = 2)]
    pub id: u64,
    #[schema(example = 1)]
    pub policy_id: u64,
    #[schema(example = "2026-08-10", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-08-21", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    /// Business days charged, at most the calendar span.
    #[schema(example = 10)]
    pub days: u32,
    #[schema(example = "Summer closure")]
    pub reason: String,
    pub deduct_from_allowance: bool,
}

impl CompanyShutdown {
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }

    /// Charged days must be positive and fit in the calendar span.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let span = DateRange::new(self.start_date, self.end_date)?.calendar_days();
        if self.days == 0 {
            return Err(ValidationError::NonPositiveDays { days: 0 });
        }
        if i64::from(self.days) > span {
            return Err(ValidationError::ShutdownDaysExceedSpan {
                days: self.days,
                span,
            });
        }
        if self.reason.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "reason" });
        }
        Ok(())
    }
}

/// A policy together with its blackout and shutdown children, as handed to
/// the calculators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PolicyBundle {
    pub policy: LeavePolicy,
    pub blackouts: Vec<BlackoutPeriod>,
    pub shutdowns: Vec<CompanyShutdown>,
}

impl PolicyBundle {
    pub fn deducting_shutdowns(&self) -> impl Iterator<Item = &CompanyShutdown> {
        self.shutdowns.iter().filter(|s| s.deduct_from_allowance)
    }
}

/// Raw `leave_policies` row; enum columns are stored as their
/// SCREAMING_SNAKE_CASE names.
#[derive(Debug, sqlx::FromRow)]
pub struct LeavePolicyRow {
    pub id: u64,
    pub is_company_default: bool,
    pub base_annual_days: u32,
    pub seniority_step_years: u32,
    pub bonus_per_step: u32,
    pub accrual_method: String,
    pub rounding_method: String,
    pub allow_carryover: bool,
    pub max_carryover_days: Option<u32>,
    pub carryover_expiry_month: Option<u32>,
    pub carryover_expiry_day: Option<u32>,
    pub max_negative_balance: i32,
    pub max_consecutive_days: Option<u32>,
    pub min_notice_days: Option<u32>,
    pub active: bool,
}

impl TryFrom<LeavePolicyRow> for LeavePolicy {
    type Error = ValidationError;

    fn try_from(row: LeavePolicyRow) -> Result<Self, Self::Error> {
        let accrual_method = row.accrual_method.parse().map_err(|_| {
            ValidationError::invalid_policy("accrual_method", "unknown accrual method")
        })?;
        let rounding_method = row.rounding_method.parse().map_err(|_| {
            ValidationError::invalid_policy("rounding_method", "unknown rounding method")
        })?;

        Ok(LeavePolicy {
            id: row.id,
            is_company_default: row.is_company_default,
            base_annual_days: row.base_annual_days,
            seniority_step_years: row.seniority_step_years,
            bonus_per_step: row.bonus_per_step,
            accrual_method,
            rounding_method,
            allow_carryover: row.allow_carryover,
            max_carryover_days: row.max_carryover_days,
            carryover_expiry_month: row.carryover_expiry_month,
            carryover_expiry_day: row.carryover_expiry_day,
            max_negative_balance: row.max_negative_balance,
            max_consecutive_days: row.max_consecutive_days,
            min_notice_days: row.min_notice_days,
            active: row.active,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::policy;
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_fixture_is_valid() {
        assert_eq!(policy().validate(), Ok(()));
    }

    #[test]
    fn zero_seniority_step_is_rejected() {
        let mut p = policy();
        p.seniority_step_years = 0;
        assert!(matches!(
            p.validate(),
            Err(ValidationError::InvalidPolicy { field: "seniority_step_years", .. })
        ));
    }

    #[test]
    fn positive_negative_balance_is_rejected() {
        let mut p = policy();
        p.max_negative_balance = 3;
        assert!(p.validate().is_err());
    }

    #[rstest]
    #[case(Some(2), Some(29), true)]
    #[case(Some(2), Some(30), false)]
    #[case(Some(3), None, false)]
    #[case(None, Some(31), false)]
    #[case(None, None, true)]
    fn carryover_expiry_pairs(#[case] month: Option<u32>, #[case] day: Option<u32>, #[case] ok: bool) {
        let mut p = policy();
        p.allow_carryover = true;
        p.carryover_expiry_month = month;
        p.carryover_expiry_day = day;
        assert_eq!(p.validate().is_ok(), ok);
    }

    #[test]
    fn method_names_round_trip_through_strings() {
        assert_eq!(AccrualMethod::AtYearStart.to_string(), "AT_YEAR_START");
        assert_eq!("PRO_RATA".parse::<AccrualMethod>().unwrap(), AccrualMethod::ProRata);
        assert_eq!(RoundingMethod::Ceil.as_ref(), "CEIL");
        assert!("WEEKLY".parse::<AccrualMethod>().is_err());
    }

    #[rstest]
    #[case(RoundingMethod::Floor, 7, 2, 3)]
    #[case(RoundingMethod::Ceil, 7, 2, 4)]
    #[case(RoundingMethod::Round, 7, 2, 4)]
    #[case(RoundingMethod::Round, 13, 4, 3)]
    #[case(RoundingMethod::Ceil, 8, 2, 4)]
    fn rounding_is_exact(
        #[case] method: RoundingMethod,
        #[case] num: u64,
        #[case] den: u64,
        #[case] expected: u32,
    ) {
        assert_eq!(method.apply(num, den), expected);
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn inverted_blackout_is_rejected() {
        let b = super::fixtures::blackout(1, d(2026, 12, 23), d(2026, 12, 14), false);
        assert_eq!(
            b.validate(),
            Err(ValidationError::InvertedRange {
                start: d(2026, 12, 23),
                end: d(2026, 12, 14),
            })
        );
    }

    #[rstest]
    #[case(5, true)]
    #[case(7, true)]
    #[case(8, false)]
    #[case(0, false)]
    fn shutdown_days_fit_span(#[case] days: u32, #[case] ok: bool) {
        // Mon 2026-08-10 .. Sun 2026-08-16 spans 7 calendar days
        let s = super::fixtures::shutdown(1, d(2026, 8, 10), d(2026, 8, 16), days, true);
        assert_eq!(s.validate().is_ok(), ok);
    }

    #[test]
    fn row_with_unknown_method_is_rejected() {
        let row = LeavePolicyRow {
            id: 1,
            is_company_default: true,
            base_annual_days: 20,
            seniority_step_years: 5,
            bonus_per_step: 1,
            accrual_method: "HOURLY".to_string(),
            rounding_method: "FLOOR".to_string(),
            allow_carryover: false,
            max_carryover_days: None,
            carryover_expiry_month: None,
            carryover_expiry_day: None,
            max_negative_balance: 0,
            max_consecutive_days: None,
            min_notice_days: None,
            active: true,
        };
        assert!(LeavePolicy::try_from(row).is_err());
    }
}
