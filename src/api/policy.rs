use crate::{
    auth::auth::AuthUser,
    error::LeaveError,
    leave::dates::{self, DateRange},
    model::leave_policy::{
        AccrualMethod, BlackoutPeriod, CompanyShutdown, LeavePolicy, PolicyBundle, RoundingMethod,
    },
    store::policy_store,
    utils::policy_cache::PolicyCache,
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

/// Company default leave policy, without the server-assigned fields.
#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "base_annual_days": 21,
    "seniority_step_years": 5,
    "bonus_per_step": 1,
    "accrual_method": "PRO_RATA",
    "rounding_method": "ROUND",
    "allow_carryover": true,
    "max_carryover_days": 5,
    "carryover_expiry_month": 3,
    "carryover_expiry_day": 31,
    "max_negative_balance": -2,
    "max_consecutive_days": 15,
    "min_notice_days": 7
}))]
pub struct PolicyPayload {
    pub base_annual_days: u32,
    pub seniority_step_years: u32,
    pub bonus_per_step: u32,
    pub accrual_method: AccrualMethod,
    pub rounding_method: RoundingMethod,
    #[serde(default)]
    pub allow_carryover: bool,
    pub max_carryover_days: Option<u32>,
    pub carryover_expiry_month: Option<u32>,
    pub carryover_expiry_day: Option<u32>,
    #[serde(default)]
    pub max_negative_balance: i32,
    pub max_consecutive_days: Option<u32>,
    pub min_notice_days: Option<u32>,
}

impl From<PolicyPayload> for LeavePolicy {
    fn from(p: PolicyPayload) -> Self {
        LeavePolicy {
            id: 0,
            is_company_default: true,
            base_annual_days: p.base_annual_days,
            seniority_step_years: p.seniority_step_years,
            bonus_per_step: p.bonus_per_step,
            accrual_method: p.accrual_method,
            rounding_method: p.rounding_method,
            allow_carryover: p.allow_carryover,
            max_carryover_days: p.max_carryover_days,
            carryover_expiry_month: p.carryover_expiry_month,
            carryover_expiry_day: p.carryover_expiry_day,
            max_negative_balance: p.max_negative_balance,
            max_consecutive_days: p.max_consecutive_days,
            min_notice_days: p.min_notice_days,
            active: true,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBlackout {
    #[schema(example = "2026-12-14", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-12-23", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Year-end site handover")]
    pub reason: String,
    /// Soft blackout: requests are accepted with a review warning
    #[serde(default)]
    pub allow_exceptions: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateShutdown {
    #[schema(example = "2026-08-10", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-08-21", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    /// Days charged; defaults to the business days in the range
    #[schema(example = 10)]
    pub days: Option<u32>,
    #[schema(example = "Summer closure")]
    pub reason: String,
    #[serde(default = "default_deduct")]
    pub deduct_from_allowance: bool,
}

fn default_deduct() -> bool {
    true
}

impl CreateShutdown {
    fn into_shutdown(self, policy_id: u64) -> Result<CompanyShutdown, LeaveError> {
        let range = DateRange::new(self.start_date, self.end_date)?;
        let shutdown = CompanyShutdown {
            id: 0,
            policy_id,
            start_date: self.start_date,
            end_date: self.end_date,
            days: self.days.unwrap_or_else(|| dates::business_days_in(&range)),
            reason: self.reason.trim().to_string(),
            deduct_from_allowance: self.deduct_from_allowance,
        };
        shutdown.validate()?;
        Ok(shutdown)
    }
}

#[utoipa::path(
    get,
    path = "/api/policy",
    responses(
        (status = 200, description = "Company policy with blackouts and shutdowns", body = PolicyBundle),
        (status = 500, description = "No company default policy configured")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Policy"
)]
pub async fn get_policy(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PolicyCache>,
) -> actix_web::Result<impl Responder> {
    let bundle = cache.get_policy_for_org(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(bundle.as_ref()))
}

/// Creates or replaces the company default policy
#[utoipa::path(
    put,
    path = "/api/policy",
    request_body = PolicyPayload,
    responses(
        (status = 200, description = "Policy saved", body = LeavePolicy),
        (status = 400, description = "Invalid policy field"),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Policy"
)]
pub async fn put_policy(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PolicyCache>,
    payload: web::Json<PolicyPayload>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let policy = LeavePolicy::from(payload.into_inner());
    let saved = policy_store::save_company_policy(pool.get_ref(), &policy).await?;
    cache.invalidate().await;

    info!(policy_id = saved.id, by = %auth.username, "Company leave policy saved");

    Ok(HttpResponse::Ok().json(saved))
}

#[utoipa::path(
    post,
    path = "/api/policy/blackouts",
    request_body = CreateBlackout,
    responses(
        (status = 201, description = "Blackout added", body = BlackoutPeriod),
        (status = 400, description = "Inverted range or missing reason"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Policy"
)]
pub async fn add_blackout(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PolicyCache>,
    payload: web::Json<CreateBlackout>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let bundle = cache.get_policy_for_org(pool.get_ref()).await?;
    let payload = payload.into_inner();
    let candidate = BlackoutPeriod {
        id: 0,
        policy_id: bundle.policy.id,
        start_date: payload.start_date,
        end_date: payload.end_date,
        reason: payload.reason.trim().to_string(),
        allow_exceptions: payload.allow_exceptions,
    };
    candidate.validate().map_err(LeaveError::from)?;

    let blackout = policy_store::add_blackout(
        pool.get_ref(),
        candidate.policy_id,
        candidate.start_date,
        candidate.end_date,
        &candidate.reason,
        candidate.allow_exceptions,
    )
    .await?;
    cache.invalidate().await;

    info!(blackout_id = blackout.id, by = auth.user_id, "Blackout period added");

    Ok(HttpResponse::Created().json(blackout))
}

#[utoipa::path(
    delete,
    path = "/api/policy/blackouts/{blackout_id}",
    params(
        ("blackout_id" = u64, Path, description = "Blackout period ID")
    ),
    responses(
        (status = 200, description = "Blackout removed", body = Object, example = json!({
            "message": "Blackout removed"
        })),
        (status = 404, description = "Blackout not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Policy"
)]
pub async fn delete_blackout(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PolicyCache>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let blackout_id = path.into_inner();

    if !policy_store::delete_blackout(pool.get_ref(), blackout_id).await? {
        return Err(LeaveError::NotFound("blackout period").into());
    }
    cache.invalidate().await;

    info!(blackout_id, by = auth.user_id, "Blackout period removed");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Blackout removed"
    })))
}

#[utoipa::path(
    post,
    path = "/api/policy/shutdowns",
    request_body = CreateShutdown,
    responses(
        (status = 201, description = "Shutdown added", body = CompanyShutdown),
        (status = 400, description = "Inverted range or days outside the span"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Policy"
)]
pub async fn add_shutdown(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PolicyCache>,
    payload: web::Json<CreateShutdown>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let bundle = cache.get_policy_for_org(pool.get_ref()).await?;
    let candidate = payload.into_inner().into_shutdown(bundle.policy.id)?;

    let shutdown = policy_store::add_shutdown(pool.get_ref(), &candidate).await?;
    cache.invalidate().await;

    info!(
        shutdown_id = shutdown.id,
        days = shutdown.days,
        deducts = shutdown.deduct_from_allowance,
        by = auth.user_id,
        "Company shutdown added"
    );

    Ok(HttpResponse::Created().json(shutdown))
}

#[utoipa::path(
    delete,
    path = "/api/policy/shutdowns/{shutdown_id}",
    params(
        ("shutdown_id" = u64, Path, description = "Company shutdown ID")
    ),
    responses(
        (status = 200, description = "Shutdown removed", body = Object, example = json!({
            "message": "Shutdown removed"
        })),
        (status = 404, description = "Shutdown not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Policy"
)]
pub async fn delete_shutdown(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PolicyCache>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let shutdown_id = path.into_inner();

    if !policy_store::delete_shutdown(pool.get_ref(), shutdown_id).await? {
        return Err(LeaveError::NotFound("company shutdown").into());
    }
    cache.invalidate().await;

    info!(shutdown_id, by = auth.user_id, "Company shutdown removed");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Shutdown removed"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn shutdown_payload(days: Option<u32>) -> CreateShutdown {
        // Mon 2026-08-10 .. Fri 2026-08-21
        CreateShutdown {
            start_date: d(2026, 8, 10),
            end_date: d(2026, 8, 21),
            days,
            reason: " Summer closure ".to_string(),
            deduct_from_allowance: true,
        }
    }

    #[test]
    fn shutdown_days_default_to_business_days() {
        let shutdown = shutdown_payload(None).into_shutdown(1).unwrap();
        assert_eq!(shutdown.days, 10);
        assert_eq!(shutdown.reason, "Summer closure");
    }

    #[test]
    fn shutdown_days_beyond_span_are_rejected() {
        let err = shutdown_payload(Some(13)).into_shutdown(1).unwrap_err();
        assert!(matches!(
            err,
            LeaveError::Validation(ValidationError::ShutdownDaysExceedSpan { days: 13, span: 12 })
        ));
    }

    #[test]
    fn payload_becomes_default_policy() {
        let payload: PolicyPayload = serde_json::from_value(json!({
            "base_annual_days": 20,
            "seniority_step_years": 4,
            "bonus_per_step": 2,
            "accrual_method": "MONTHLY",
            "rounding_method": "CEIL"
        }))
        .unwrap();

        let policy = LeavePolicy::from(payload);
        assert!(policy.is_company_default);
        assert_eq!(policy.accrual_method, AccrualMethod::Monthly);
        assert_eq!(policy.max_negative_balance, 0);
        assert_eq!(policy.validate(), Ok(()));
    }
}
