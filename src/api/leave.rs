use crate::{
    api::today,
    auth::auth::AuthUser,
    error::{LeaveError, ValidationError},
    leave::{
        balance::{self, LeaveBalance},
        calendar::{self, CalendarEvent},
        constraints::{self, Decision, LeaveRequest, LeaveWarning},
        dates::DateRange,
    },
    model::{employee::Employee, leave::Leave, leave_policy::PolicyBundle},
    store::{employee_store, leave_store},
    utils::policy_cache::PolicyCache,
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    /// Defaults to the caller's own employee record
    #[schema(example = 1000)]
    pub employee_id: Option<u64>,
    #[schema(example = "2026-11-02", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    /// Business days
    #[schema(example = 5, minimum = 1, maximum = 262)]
    pub days: i64,
    #[schema(example = "Family trip")]
    pub note: Option<String>,
    /// Record despite review warnings. HR and admins only.
    #[serde(default)]
    pub force_approve: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateLeave {
    #[schema(example = "2026-11-09", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = 3, minimum = 1, maximum = 262)]
    pub days: i64,
    #[schema(example = "Moved one week")]
    pub note: Option<String>,
    #[serde(default)]
    pub force_approve: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct ValidateLeave {
    /// Defaults to the caller's own employee record
    #[schema(example = 1000)]
    pub employee_id: Option<u64>,
    #[schema(example = "2026-11-02", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = 5, minimum = 1, maximum = 262)]
    pub days: i64,
}

#[derive(Serialize, ToSchema)]
pub struct ValidationResponse {
    pub decision: Decision,
    /// Balance of the policy year the leave would start in
    pub balance: LeaveBalance,
}

#[derive(Deserialize, IntoParams)]
pub struct LeaveQuery {
    /// Filter by employee ID; employees only ever see their own
    pub employee_id: Option<u64>,
    /// Leave starting in this policy year
    pub year: Option<i32>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    /// Items per page
    pub per_page: Option<u32>,
}

#[derive(Deserialize, IntoParams)]
pub struct CalendarQuery {
    /// First visible day
    #[param(value_type = String, format = "date")]
    pub from: NaiveDate,
    /// Last visible day, inclusive
    #[param(value_type = String, format = "date")]
    pub to: NaiveDate,
    /// Only this employee's leave
    pub employee_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveResponse {
    #[schema(example = 12)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-11-02", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    /// Last business day covered
    #[schema(example = "2026-11-06", format = "date", value_type = String)]
    pub end_date: Option<NaiveDate>,
    #[schema(example = 5)]
    pub days: u32,
    #[schema(example = "Family trip")]
    pub note: Option<String>,
    #[schema(example = "2026-10-17T08:00:00Z", format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<Leave> for LeaveResponse {
    fn from(leave: Leave) -> Self {
        Self {
            end_date: calendar::last_business_day(leave.start_date, i64::from(leave.days)),
            id: leave.id,
            employee_id: leave.employee_id,
            start_date: leave.start_date,
            days: leave.days,
            note: leave.note,
            created_at: leave.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveResponse>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct RecordedLeave {
    pub leave: LeaveResponse,
    /// Warnings HR overrode with `force_approve`
    pub warnings: Vec<LeaveWarning>,
    pub segments: Vec<calendar::CalendarSegment>,
}

/// What is being written: a new leave, or a replacement for an existing one.
#[derive(Debug, Clone, Copy)]
enum Booking {
    Create,
    Replace(u64),
}

impl Booking {
    fn excludes(&self, leave: &Leave) -> bool {
        matches!(self, Booking::Replace(id) if *id == leave.id)
    }
}

fn own_employee_id(auth: &AuthUser, requested: Option<u64>) -> actix_web::Result<u64> {
    let employee_id = match requested.or(auth.employee_id) {
        Some(id) => id,
        None => return Err(actix_web::error::ErrorForbidden("No employee profile")),
    };
    auth.require_self_or_hr(employee_id)?;
    Ok(employee_id)
}

/// Balance of the year `request` starts in, without the leave being replaced.
/// Leave can only be booked in years a balance exists for.
fn balance_for_request(
    employee: &Employee,
    bundle: &PolicyBundle,
    leaves: &[Leave],
    booking: Booking,
    request: &LeaveRequest,
    today: NaiveDate,
) -> Result<LeaveBalance, ValidationError> {
    let reference =
        balance::checked_reference_date(request.start_date.year(), employee.hired_at, today)?;
    let others: Vec<Leave> = leaves
        .iter()
        .filter(|leave| !booking.excludes(leave))
        .cloned()
        .collect();

    Ok(balance::balance_for_year(
        employee.hired_at,
        &bundle.policy,
        &others,
        &bundle.shutdowns,
        reference,
    ))
}

fn evaluate(
    employee: &Employee,
    bundle: &PolicyBundle,
    leaves: &[Leave],
    booking: Booking,
    request: &LeaveRequest,
    today: NaiveDate,
) -> Result<(Decision, LeaveBalance), ValidationError> {
    let balance = balance_for_request(employee, bundle, leaves, booking, request, today)?;
    let decision = constraints::validate_request(request, bundle, &balance, today)?;
    Ok((decision, balance))
}

/// Validates optimistically, then records the leave while holding the
/// employee's row lock. The balance is recomputed from committed rows under
/// the lock; a request that no longer passes is a `ConcurrencyConflict`.
async fn record_leave(
    pool: &MySqlPool,
    bundle: &PolicyBundle,
    employee_id: u64,
    booking: Booking,
    request: LeaveRequest,
    note: Option<&str>,
    approved_by_hr: bool,
) -> Result<(u64, Decision), LeaveError> {
    let today = today();

    let employee = employee_store::get_employee(pool, employee_id)
        .await?
        .ok_or(LeaveError::NotFound("employee"))?;
    let leaves = leave_store::list_all_leaves(pool, employee_id).await?;

    let (decision, _) = evaluate(&employee, bundle, &leaves, booking, &request, today)?;
    match &decision {
        Decision::Rejected { violation } => {
            info!(employee_id, code = violation.code(), "Leave request rejected");
            return Err(LeaveError::Rejected(violation.clone()));
        }
        Decision::Accepted { warnings, .. } if !warnings.is_empty() && !approved_by_hr => {
            return Err(LeaveError::ReviewRequired(warnings.clone()));
        }
        Decision::Accepted { .. } => {}
    }

    let mut tx = pool.begin().await?;

    let employee = leave_store::lock_employee(&mut tx, employee_id)
        .await?
        .ok_or(LeaveError::NotFound("employee"))?;
    let leaves = leave_store::list_all_leaves(&mut *tx, employee_id).await?;

    let (recheck, balance) = evaluate(&employee, bundle, &leaves, booking, &request, today)?;
    if let Decision::Rejected { violation } = &recheck {
        warn!(
            employee_id,
            code = violation.code(),
            remaining = balance.remaining,
            "Leave request lost a race with a concurrent booking"
        );
        return Err(LeaveError::ConcurrencyConflict { employee_id });
    }

    let leave_id = match booking {
        Booking::Create => leave_store::insert_leave(&mut tx, employee_id, request.start_date, request.days, note).await?,
        Booking::Replace(leave_id) => {
            if !leave_store::update_leave(&mut tx, leave_id, request.start_date, request.days, note).await? {
                return Err(LeaveError::NotFound("leave"));
            }
            leave_id
        }
    };

    tx.commit().await?;

    Ok((leave_id, recheck))
}

async fn recorded_response(
    pool: &MySqlPool,
    leave_id: u64,
    decision: Decision,
) -> Result<RecordedLeave, LeaveError> {
    let leave = leave_store::get_leave(pool, leave_id)
        .await?
        .ok_or(LeaveError::NotFound("leave"))?;
    let (warnings, segments) = match decision {
        Decision::Accepted { warnings, segments } => (warnings, segments),
        Decision::Rejected { .. } => (Vec::new(), Vec::new()),
    };

    Ok(RecordedLeave {
        leave: leave.into(),
        warnings,
        segments,
    })
}

/* =========================
Create leave
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave to record",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave recorded", body = RecordedLeave),
        (status = 400, description = "Malformed request"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Needs HR review, or a concurrent booking changed the balance"),
        (status = 422, description = "Rejected by the leave policy", body = Object, example = json!({
            "message": "leave request rejected: 11 consecutive days requested, at most 10 allowed",
            "code": "CONSECUTIVE_DAYS_EXCEEDED",
            "violation": {"code": "CONSECUTIVE_DAYS_EXCEEDED", "requested": 11, "max": 10}
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PolicyCache>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = own_employee_id(&auth, payload.employee_id)?;
    if payload.force_approve {
        auth.require_hr_or_admin()?;
    }

    let bundle = cache.get_policy_for_org(pool.get_ref()).await?;
    let request = LeaveRequest::new(payload.start_date, payload.days).map_err(LeaveError::from)?;

    let (leave_id, decision) = record_leave(
        pool.get_ref(),
        &bundle,
        employee_id,
        Booking::Create,
        request,
        payload.note.as_deref(),
        payload.force_approve,
    )
    .await?;

    info!(leave_id, employee_id, days = payload.days, by = auth.user_id, "Leave recorded");

    let body = recorded_response(pool.get_ref(), leave_id, decision).await?;
    Ok(HttpResponse::Created().json(body))
}

/* =========================
Update leave
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave to change")
    ),
    request_body = UpdateLeave,
    responses(
        (status = 200, description = "Leave updated", body = RecordedLeave),
        (status = 400, description = "Malformed request"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave not found"),
        (status = 409, description = "Needs HR review, or a concurrent booking changed the balance"),
        (status = 422, description = "Rejected by the leave policy")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn update_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PolicyCache>,
    path: web::Path<u64>,
    payload: web::Json<UpdateLeave>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let existing = leave_store::get_leave(pool.get_ref(), leave_id)
        .await
        .map_err(LeaveError::from)?
        .ok_or(LeaveError::NotFound("leave"))?;
    auth.require_self_or_hr(existing.employee_id)?;
    if payload.force_approve {
        auth.require_hr_or_admin()?;
    }

    let bundle = cache.get_policy_for_org(pool.get_ref()).await?;
    let request = LeaveRequest::new(payload.start_date, payload.days).map_err(LeaveError::from)?;

    let (leave_id, decision) = record_leave(
        pool.get_ref(),
        &bundle,
        existing.employee_id,
        Booking::Replace(leave_id),
        request,
        payload.note.as_deref(),
        payload.force_approve,
    )
    .await?;

    info!(leave_id, employee_id = existing.employee_id, by = auth.user_id, "Leave updated");

    let body = recorded_response(pool.get_ref(), leave_id, decision).await?;
    Ok(HttpResponse::Ok().json(body))
}

/* =========================
Dry run
========================= */
#[utoipa::path(
    post,
    path = "/api/leave/validate",
    request_body = ValidateLeave,
    responses(
        (status = 200, description = "Decision the policy would take, nothing recorded", body = ValidationResponse),
        (status = 400, description = "Malformed request"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn validate_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PolicyCache>,
    payload: web::Json<ValidateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = own_employee_id(&auth, payload.employee_id)?;
    let request = LeaveRequest::new(payload.start_date, payload.days).map_err(LeaveError::from)?;

    let bundle = cache.get_policy_for_org(pool.get_ref()).await?;
    let employee = employee_store::get_employee(pool.get_ref(), employee_id)
        .await
        .map_err(LeaveError::from)?
        .ok_or(LeaveError::NotFound("employee"))?;
    let leaves = leave_store::list_all_leaves(pool.get_ref(), employee_id)
        .await
        .map_err(LeaveError::from)?;
    let (decision, balance) = evaluate(&employee, &bundle, &leaves, Booking::Create, &request, today())
        .map_err(LeaveError::from)?;

    Ok(HttpResponse::Ok().json(ValidationResponse { decision, balance }))
}

#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave to fetch")
    ),
    responses(
        (status = 200, description = "Leave found", body = LeaveResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave not found", body = Object, example = json!({
            "message": "leave not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let leave = leave_store::get_leave(pool.get_ref(), leave_id)
        .await
        .map_err(LeaveError::from)?
        .ok_or(LeaveError::NotFound("leave"))?;
    auth.require_self_or_hr(leave.employee_id)?;

    Ok(HttpResponse::Ok().json(LeaveResponse::from(leave)))
}

#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveQuery),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = if auth.is_hr_or_admin() {
        query.employee_id
    } else {
        Some(own_employee_id(&auth, query.employee_id)?)
    };

    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let filter = leave_store::LeaveFilter {
        employee_id,
        year: query.year,
    };

    let (leaves, total) = leave_store::list_leaves_page(pool.get_ref(), &filter, page, per_page)
        .await
        .map_err(LeaveError::from)?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: leaves.into_iter().map(LeaveResponse::from).collect(),
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave to delete")
    ),
    responses(
        (status = 200, description = "Leave deleted", body = Object, example = json!({
            "message": "Leave deleted"
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn delete_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let leave = leave_store::get_leave(pool.get_ref(), leave_id)
        .await
        .map_err(LeaveError::from)?
        .ok_or(LeaveError::NotFound("leave"))?;
    auth.require_self_or_hr(leave.employee_id)?;

    if !leave_store::delete_leave(pool.get_ref(), leave_id)
        .await
        .map_err(LeaveError::from)?
    {
        return Err(LeaveError::NotFound("leave").into());
    }

    info!(leave_id, employee_id = leave.employee_id, by = auth.user_id, "Leave deleted");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave deleted"
    })))
}

/// Weekend-free blocks for every leave touching `[from, to]`
#[utoipa::path(
    get,
    path = "/api/leave/calendar",
    params(CalendarQuery),
    responses(
        (status = 200, description = "Calendar blocks in the window", body = [CalendarEvent]),
        (status = 400, description = "`to` is before `from`")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_calendar(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<CalendarQuery>,
) -> actix_web::Result<impl Responder> {
    let window = DateRange::new(query.from, query.to).map_err(LeaveError::from)?;

    let leaves = leave_store::list_leaves_between(pool.get_ref(), &window, query.employee_id)
        .await
        .map_err(LeaveError::from)?;

    Ok(HttpResponse::Ok().json(calendar::calendar_events(&leaves, &window)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leave::constraints::ConstraintViolation;
    use crate::model::leave_policy::fixtures::{bundle, policy};
    use crate::model::role::Role;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn employee() -> Employee {
        Employee {
            id: 1,
            name: "Ana".to_string(),
            hired_at: d(2019, 1, 10),
            birth_date: None,
        }
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

    fn auth(role: Role, employee_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 9,
            username: "someone".to_string(),
            role,
            employee_id,
        }
    }

    #[test]
    fn response_exposes_last_business_day() {
        // Thu 2026-10-15 + 3 business days ends Mon 2026-10-19
        let response = LeaveResponse::from(leave(1, d(2026, 10, 15), 3));
        assert_eq!(response.end_date, Some(d(2026, 10, 19)));
    }

    #[test]
    fn replaced_leave_does_not_count_against_itself() {
        let bundle = bundle(policy());
        let leaves = vec![leave(1, d(2026, 11, 2), 20)];
        let today = d(2026, 10, 17);
        // 22 days, 20 already booked
        let request = LeaveRequest {
            start_date: d(2026, 11, 2),
            days: 20,
        };

        let (create, _) = evaluate(&employee(), &bundle, &leaves, Booking::Create, &request, today).unwrap();
        assert!(matches!(
            create,
            Decision::Rejected {
                violation: ConstraintViolation::InsufficientBalance { .. }
            }
        ));

        let (replace, balance) = evaluate(&employee(), &bundle, &leaves, Booking::Replace(1), &request, today).unwrap();
        assert!(replace.is_accepted());
        assert_eq!(balance.remaining, 22);
    }

    #[test]
    fn next_year_request_is_checked_against_next_years_balance() {
        let bundle = bundle(policy());
        let leaves = vec![leave(1, d(2026, 3, 2), 22)];
        let request = LeaveRequest {
            start_date: d(2027, 1, 11),
            days: 5,
        };

        let (decision, balance) =
            evaluate(&employee(), &bundle, &leaves, Booking::Create, &request, d(2026, 10, 17)).unwrap();
        assert!(decision.is_accepted());
        assert_eq!(balance.year, 2027);
    }

    #[test]
    fn far_future_request_is_refused_before_any_balance_work() {
        let request = LeaveRequest {
            start_date: d(262_000, 1, 5),
            days: 1,
        };
        let result = evaluate(&employee(), &bundle(policy()), &[], Booking::Create, &request, d(2026, 10, 17));
        assert_eq!(
            result.unwrap_err(),
            ValidationError::YearOutOfRange {
                year: 262_000,
                earliest: 2019,
                latest: 2027,
            }
        );
    }

    #[test]
    fn non_positive_days_is_a_validation_error() {
        let request = LeaveRequest {
            start_date: d(2026, 11, 2),
            days: 0,
        };
        let result = evaluate(&employee(), &bundle(policy()), &[], Booking::Create, &request, d(2026, 10, 17));
        assert_eq!(result.unwrap_err(), ValidationError::NonPositiveDays { days: 0 });
    }

    #[test]
    fn employees_default_to_their_own_record() {
        assert_eq!(own_employee_id(&auth(Role::Employee, Some(5)), None).unwrap(), 5);
        assert!(own_employee_id(&auth(Role::Employee, Some(5)), Some(6)).is_err());
        assert!(own_employee_id(&auth(Role::Employee, None), None).is_err());
        assert_eq!(own_employee_id(&auth(Role::Hr, None), Some(6)).unwrap(), 6);
    }
}
