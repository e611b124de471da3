use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A recorded leave: `days` business days starting at the first weekday on
/// or after `start_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Leave {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-07-06", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = 5)]
    pub days: u32,
    #[schema(example = "Family trip", nullable = true)]
    pub note: Option<String>,
    #[schema(example = "2026-06-01T08:00:00Z", format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}
