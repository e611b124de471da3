use crate::api::employee::{BalanceResponse, CreateEmployee, EmployeeListResponse, EmployeeResponse};
use crate::api::leave::{
    CreateLeave, LeaveListResponse, LeaveResponse, RecordedLeave, UpdateLeave, ValidateLeave,
    ValidationResponse,
};
use crate::api::policy::{CreateBlackout, CreateShutdown, PolicyPayload};
use crate::leave::balance::LeaveBalance;
use crate::leave::calendar::{CalendarEvent, CalendarSegment};
use crate::leave::constraints::{ConstraintViolation, Decision, LeaveRequest, LeaveWarning};
use crate::model::leave_policy::{
    AccrualMethod, BlackoutPeriod, CompanyShutdown, LeavePolicy, PolicyBundle, RoundingMethod,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave Planner API",
        version = "0.1.0",
        description = r#"
## Leave entitlement & scheduling

Back-office API for paid leave of a construction company.

### Key Features
- **Employees**
  - Create, update, list and view employees, with derived age and seniority
  - Per-year leave balance: accrued, carried over, taken, remaining
- **Leave**
  - Record, move and cancel leave counted in business days
  - Dry-run validation against notice, consecutive-day cap, blackouts and balance floor
  - Weekend-free calendar blocks for any date window
- **Policy**
  - One company default policy: base days, seniority bonus, accrual and rounding method, carryover
  - Blackout periods and company shutdowns

### Security
Every endpoint expects a **JWT Bearer** access token issued by the identity service.
Policy edits need **Admin** or **HR**; employees only see and book their own leave.
"#,
    ),
    paths(
        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::get_balance,

        crate::api::leave::create_leave,
        crate::api::leave::leave_list,
        crate::api::leave::get_leave,
        crate::api::leave::update_leave,
        crate::api::leave::delete_leave,
        crate::api::leave::validate_leave,
        crate::api::leave::leave_calendar,

        crate::api::policy::get_policy,
        crate::api::policy::put_policy,
        crate::api::policy::add_blackout,
        crate::api::policy::delete_blackout,
        crate::api::policy::add_shutdown,
        crate::api::policy::delete_shutdown
    ),
    components(
        schemas(
            CreateEmployee,
            EmployeeResponse,
            EmployeeListResponse,
            BalanceResponse,
            LeaveBalance,
            CreateLeave,
            UpdateLeave,
            ValidateLeave,
            ValidationResponse,
            RecordedLeave,
            LeaveResponse,
            LeaveListResponse,
            LeaveRequest,
            Decision,
            ConstraintViolation,
            LeaveWarning,
            CalendarSegment,
            CalendarEvent,
            PolicyPayload,
            CreateBlackout,
            CreateShutdown,
            LeavePolicy,
            AccrualMethod,
            RoundingMethod,
            BlackoutPeriod,
            CompanyShutdown,
            PolicyBundle
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Employee", description = "Employees and their leave balance"),
        (name = "Leave", description = "Recording, validating and displaying leave"),
        (name = "Policy", description = "Company leave policy, blackouts and shutdowns"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/api/employee",
            "/api/employee/{employee_id}/balance",
            "/api/leave/validate",
            "/api/leave/calendar",
            "/api/policy/shutdowns/{shutdown_id}",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
        assert!(doc.components.unwrap().security_schemes.contains_key("bearer_auth"));
    }
}
