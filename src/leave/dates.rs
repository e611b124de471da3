use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ValidationError;

/// Inclusive calendar date range. Both ends are part of the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DateRange {
    #[schema(example = "2026-07-01", format = "date", value_type = String)]
    pub start: NaiveDate,
    #[schema(example = "2026-07-15", format = "date", value_type = String)]
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Shared overlap check for blackouts, shutdowns and policy years.
    pub fn intersects(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered, counting both ends.
    pub fn calendar_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Jan 1 through Dec 31 of `year`. `None` outside chrono's calendar.
pub fn policy_year(year: i32) -> Option<DateRange> {
    Some(DateRange {
        start: first_day_of_year(year)?,
        end: last_day_of_year(year)?,
    })
}

pub fn first_day_of_year(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_yo_opt(year, 1)
}

pub fn last_day_of_year(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_yo_opt(year, days_in_year(year))
}

pub fn days_in_year(year: i32) -> u32 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366
    } else {
        365
    }
}

/// Last calendar day of the month `date` falls in.
pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

/// Resolves a month/day pair inside `year`, clamping to the month's last day
/// (Feb 29 becomes Feb 28 in common years).
pub fn month_day_in_year(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = last_day_of_month(first);
    first.with_day(day.min(last.day()))
}

/// Completed years from `from` to `to`; the count only ticks over on the
/// anniversary and never goes below zero.
pub fn full_years_between(from: NaiveDate, to: NaiveDate) -> u32 {
    let mut years = to.year() - from.year();
    if (to.month(), to.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

pub fn age_from(birth_date: NaiveDate, today: NaiveDate) -> u32 {
    full_years_between(birth_date, today)
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// `None` when the weekend runs into the end of the calendar.
pub fn next_weekday_on_or_after(date: NaiveDate) -> Option<NaiveDate> {
    match date.weekday() {
        Weekday::Sat => date.checked_add_signed(Duration::days(2)),
        Weekday::Sun => date.checked_add_signed(Duration::days(1)),
        _ => Some(date),
    }
}

/// Mon-Fri days inside the range.
pub fn business_days_in(range: &DateRange) -> u32 {
    range
        .start
        .iter_days()
        .take_while(|d| *d <= range.end)
        .filter(|d| !is_weekend(*d))
        .count() as u32
}
