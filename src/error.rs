use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;

use crate::leave::constraints::{ConstraintViolation, LeaveWarning};

/// Malformed input. Rejected immediately and never worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("days must be a positive number of business days, got {days}")]
    NonPositiveDays { days: i64 },

    #[error("end date {end} is before start date {start}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid policy field `{field}`: {reason}")]
    InvalidPolicy {
        field: &'static str,
        reason: &'static str,
    },

    #[error("shutdown charges {days} days but only spans {span} calendar days")]
    ShutdownDaysExceedSpan { days: u32, span: i64 },

    #[error("{days} business days cannot be recorded as one leave")]
    DaysOutOfRange { days: i64 },

    #[error("`{field}` must not be empty")]
    EmptyField { field: &'static str },

    #[error("no balance for year {year}, years {earliest} through {latest} are available")]
    YearOutOfRange { year: i32, earliest: i32, latest: i32 },
}

impl ValidationError {
    pub fn invalid_policy(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidPolicy { field, reason }
    }
}

#[derive(Debug, Error)]
pub enum LeaveError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("leave request rejected: {0}")]
    Rejected(ConstraintViolation),

    #[error("leave request needs manual review")]
    ReviewRequired(Vec<LeaveWarning>),

    #[error("balance changed for employee {employee_id} while the request was being recorded")]
    ConcurrencyConflict { employee_id: u64 },

    #[error("no active company default leave policy is configured")]
    PolicyNotConfigured,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ResponseError for LeaveError {
    fn status_code(&self) -> StatusCode {
        match self {
            LeaveError::Validation(_) => StatusCode::BAD_REQUEST,
            LeaveError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LeaveError::ReviewRequired(_) | LeaveError::ConcurrencyConflict { .. } => {
                StatusCode::CONFLICT
            }
            LeaveError::NotFound(_) => StatusCode::NOT_FOUND,
            LeaveError::PolicyNotConfigured | LeaveError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            LeaveError::Rejected(violation) => json!({
                "message": self.to_string(),
                "code": violation.code(),
                "violation": violation,
            }),
            LeaveError::ReviewRequired(warnings) => json!({
                "message": "Leave request needs HR approval, resubmit with force_approve",
                "warnings": warnings,
            }),
            LeaveError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                json!({ "message": "Internal Server Error" })
            }
            _ => json!({ "message": self.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn validation_errors_are_bad_requests() {
        let err = LeaveError::from(ValidationError::NonPositiveDays { days: 0 });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn unknown_balance_year_is_a_bad_request() {
        let err = LeaveError::from(ValidationError::YearOutOfRange {
            year: 300_000,
            earliest: 2019,
            latest: 2027,
        });
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(resp.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body["message"],
            "no balance for year 300000, years 2019 through 2027 are available"
        );
    }

    #[test]
    fn conflicts_map_to_409() {
        let err = LeaveError::ConcurrencyConflict { employee_id: 7 };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.to_string().contains("employee 7"));
    }

    #[actix_web::test]
    async fn rejection_body_carries_reason_code() {
        let err = LeaveError::Rejected(ConstraintViolation::ConsecutiveDaysExceeded {
            requested: 11,
            max: 10,
        });
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = to_bytes(resp.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "CONSECUTIVE_DAYS_EXCEEDED");
    }

    #[actix_web::test]
    async fn database_details_are_not_leaked() {
        let err = LeaveError::Database(sqlx::Error::RowNotFound);
        let resp = err.error_response();
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Internal Server Error");
    }
}
