//! Expands leave into weekend-free calendar blocks.
//!
//! A leave of `n` business days is drawn as one block per working week, so a
//! calendar never paints a block across Saturday and Sunday while the number
//! of covered weekdays stays exactly `n`.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use super::dates::{self, DateRange};
use crate::model::leave::Leave;

/// Half-open run of consecutive weekdays, `[start, end_exclusive)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CalendarSegment {
    #[schema(example = "2026-10-19", format = "date", value_type = String)]
    pub start: NaiveDate,
    #[schema(example = "2026-10-22", format = "date", value_type = String)]
    pub end_exclusive: NaiveDate,
}

impl CalendarSegment {
    pub fn len(&self) -> i64 {
        (self.end_exclusive - self.start).num_days()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0
    }

    /// Inclusive view for overlap checks.
    pub fn as_range(&self) -> DateRange {
        DateRange {
            start: self.start,
            end: self.end_exclusive - Duration::days(1),
        }
    }
}

/// Splits `business_days` weekdays starting at the first weekday on or after
/// `start` into per-week segments. Non-positive counts yield nothing, and
/// segmenting stops at the last date chrono can represent.
pub fn segment_business_days(start: NaiveDate, business_days: i64) -> Vec<CalendarSegment> {
    let mut segments = Vec::new();
    let mut remaining = business_days;
    let mut next = dates::next_weekday_on_or_after(start);

    while remaining > 0 {
        let Some(cursor) = next else { break };
        let weekday = i64::from(cursor.weekday().number_from_monday());
        let left_in_week = 5 - weekday + 1;
        let take = remaining.min(left_in_week);

        let Some(end_exclusive) = cursor.checked_add_signed(Duration::days(take)) else {
            break;
        };
        segments.push(CalendarSegment {
            start: cursor,
            end_exclusive,
        });

        remaining -= take;
        next = dates::next_weekday_on_or_after(end_exclusive);
    }

    segments
}

/// Date of the last business day a leave covers.
pub fn last_business_day(start: NaiveDate, business_days: i64) -> Option<NaiveDate> {
    segment_business_days(start, business_days)
        .last()
        .map(|segment| segment.end_exclusive - Duration::days(1))
}

const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Stable per-employee color so every block of one person matches.
pub fn employee_color(employee_id: u64) -> &'static str {
    PALETTE[(employee_id % PALETTE.len() as u64) as usize]
}

/// One visual block on the leave calendar.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CalendarEvent {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = 12)]
    pub leave_id: u64,
    #[schema(example = "Family trip", nullable = true)]
    pub note: Option<String>,
    #[schema(example = "#2ca02c")]
    pub color: String,
    #[serde(flatten)]
    pub segment: CalendarSegment,
}

/// Calendar blocks for `leaves`, keeping only the segments that touch `window`.
pub fn calendar_events(leaves: &[Leave], window: &DateRange) -> Vec<CalendarEvent> {
    leaves
        .iter()
        .flat_map(|leave| {
            segment_business_days(leave.start_date, i64::from(leave.days))
                .into_iter()
                .filter(|segment| segment.as_range().intersects(window))
                .map(move |segment| CalendarEvent {
                    employee_id: leave.employee_id,
                    leave_id: leave.id,
                    note: leave.note.clone(),
                    color: employee_color(leave.employee_id).to_string(),
                    segment,
                })
        })
        .collect()
}
